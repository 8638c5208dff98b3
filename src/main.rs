//! racefeed binary: operator console on stdin/stdout, subscribers over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use racefeed::{Config, FeedBuilder, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "racefeed")]
#[command(about = "Simulated live race feed broadcast to TCP subscribers")]
#[command(version)]
struct Cli {
    /// Listen address (overrides --port)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Port on all interfaces
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Real milliseconds per race time unit (1000 = real time)
    #[arg(long, default_value = "1000")]
    time_unit_ms: u64,

    /// Seed for the race generator
    #[arg(long)]
    seed: Option<u64>,

    /// Log every broadcast frame
    #[arg(long)]
    echo_feed: bool,

    /// Largest split count accepted by `sim`
    #[arg(long, default_value = "100")]
    max_splits: u32,
}

impl Cli {
    fn config(&self) -> Config {
        let mut cfg = Config::default().with_port(self.port);
        if let Some(listen) = self.listen {
            cfg.listen = listen;
        }
        cfg.time_unit = Duration::from_millis(self.time_unit_ms);
        cfg.echo_feed = self.echo_feed;
        cfg.max_splits = self.max_splits;
        cfg
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async {
        let mut builder = FeedBuilder::new(cli.config());
        if let Some(seed) = cli.seed {
            builder = builder.with_rng_seed(seed);
        }
        let feed = builder.build();
        let server = feed.bind().await?;
        feed.run(server, tokio::io::stdin(), tokio::io::stdout()).await;
        anyhow::Ok(())
    })?;

    // stdin reads block a worker thread; don't wait on them
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
