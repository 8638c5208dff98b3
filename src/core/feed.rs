//! # Feed: the top-level service context.
//!
//! [`Feed`] owns the [`SubscriberRegistry`], the [`Scheduler`] and the
//! [`RaceSimulator`], executes operator [`Command`]s against them, and runs
//! the whole service.
//!
//! ## Service layout
//! ```text
//! Feed::run(server, stdin, stdout)
//!   ├─► Scheduler::run(token)         (single driver task, fires events)
//!   ├─► FeedServer::run(token)        (accept loop + one task per subscriber)
//!   ├─► run_console(feed, in, out)    (operator lines → Feed::execute)
//!   └─► wait: OS signal | token cancelled (`quit`)
//!           └─► token.cancel() → every task winds down → join
//! ```
//!
//! Nothing here is global: tests build as many feeds as they like.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::scheduler::{EventHandle, Scheduler};
use super::shutdown;
use super::simulator::{RaceSimulator, ScheduledRace};
use crate::console::{self, Command, USAGE};
use crate::error::FeedError;
use crate::messages::{FeedCodec, Message};
use crate::server::FeedServer;
use crate::subscribers::{BroadcastReport, SubscriberRegistry};

/// What a command did, for the operator.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A message was broadcast immediately.
    Broadcast {
        /// Message kind (`raw`, `status`, `split`).
        kind: &'static str,
        /// Delivery result.
        report: BroadcastReport,
    },
    /// A race was handed to the scheduler.
    Scheduled(ScheduledRace),
    /// Pending events of a race were cancelled.
    Aborted {
        /// Component id.
        component: String,
        /// Events that were still pending.
        cancelled: usize,
    },
    /// Current feed state.
    Status {
        /// Registered sinks.
        subscribers: usize,
        /// Events waiting to fire.
        pending: usize,
        /// Components with pending events.
        races: usize,
    },
    /// Command list.
    Help,
    /// Shutdown requested.
    Quit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Broadcast { kind, report } => {
                write!(f, "sent {kind} to {} subscriber(s)", report.delivered)?;
                if report.dropped > 0 {
                    write!(f, ", {} dropped", report.dropped)?;
                }
                if !report.evicted.is_empty() {
                    write!(f, ", {} evicted", report.evicted.len())?;
                }
                Ok(())
            }
            Outcome::Scheduled(race) => write!(
                f,
                "race {} scheduled: {} events over {:.2}s",
                race.component,
                race.handles.len(),
                race.duration.as_secs_f64()
            ),
            Outcome::Aborted {
                component,
                cancelled,
            } => write!(f, "race {component}: {cancelled} pending event(s) cancelled"),
            Outcome::Status {
                subscribers,
                pending,
                races,
            } => write!(
                f,
                "subscribers: {subscribers}, pending events: {pending}, active races: {races}"
            ),
            Outcome::Help => f.write_str(USAGE),
            Outcome::Quit => f.write_str("shutting down"),
        }
    }
}

/// The feed service context.
///
/// Built by [`FeedBuilder`](crate::FeedBuilder).
pub struct Feed {
    cfg: Config,
    registry: Arc<SubscriberRegistry>,
    scheduler: Scheduler,
    simulator: RaceSimulator,
    races: Mutex<HashMap<String, Vec<EventHandle>>>,
    token: CancellationToken,
}

impl Feed {
    pub(crate) fn new_internal(
        cfg: Config,
        registry: Arc<SubscriberRegistry>,
        scheduler: Scheduler,
        simulator: RaceSimulator,
        token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            registry,
            scheduler,
            simulator,
            races: Mutex::new(HashMap::new()),
            token,
        }
    }

    /// Configuration the feed was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Connected sinks.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Pending events.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Race generator.
    pub fn simulator(&self) -> &RaceSimulator {
        &self.simulator
    }

    /// Decoder for this feed's frames, limited to `Config::max_frame_len`.
    pub fn codec(&self) -> FeedCodec {
        FeedCodec::with_max_frame_len(self.cfg.max_frame_len_clamped())
    }

    /// Token cancelled on shutdown (signal or `quit`).
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Executes one operator command.
    ///
    /// Errors leave the feed untouched: nothing is broadcast or scheduled.
    pub async fn execute(&self, command: Command) -> Result<Outcome, FeedError> {
        tracing::debug!(command = command.as_label(), "executing");
        match command {
            Command::Raw(text) => Ok(self.broadcast(Message::raw(text)).await),
            Command::Stt { component, state } => {
                Ok(self.broadcast(Message::status(component, state)).await)
            }
            Command::Logr {
                component,
                participant,
                split,
            } => {
                let log = self.simulator.random_split(&component, &participant, split);
                Ok(self.broadcast(log.into()).await)
            }
            Command::Sim {
                component,
                splits,
                participants,
            } => {
                let race = self.simulator.simulate(&component, splits, &participants)?;
                self.track(&race);
                Ok(Outcome::Scheduled(race))
            }
            Command::Abort { component } => Ok(self.abort(&component)),
            Command::Status => Ok(Outcome::Status {
                subscribers: self.registry.len().await,
                pending: self.scheduler.pending(),
                races: self.active_races(),
            }),
            Command::Help => Ok(Outcome::Help),
            Command::Quit => {
                tracing::info!("shutdown requested by operator");
                self.token.cancel();
                Ok(Outcome::Quit)
            }
        }
    }

    /// Binds the subscriber listener on `Config::listen`.
    pub async fn bind(&self) -> Result<FeedServer, FeedError> {
        FeedServer::bind(
            self.cfg.listen,
            Arc::clone(&self.registry),
            self.cfg.sink_capacity_clamped(),
        )
        .await
    }

    /// Runs the service until an OS signal arrives or `quit` is executed.
    ///
    /// The console ending (EOF on `input`) does not stop the service.
    pub async fn run<R, W>(self: Arc<Self>, server: FeedServer, input: R, output: W)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let scheduler = self.scheduler.spawn(self.token.child_token());
        let listener = tokio::spawn(server.run(self.token.child_token()));
        let console = tokio::spawn(console::run_console(
            Arc::clone(&self),
            input,
            output,
            self.token.child_token(),
        ));

        tokio::select! {
            _ = self.token.cancelled() => {}
            signal = shutdown::wait_for_shutdown_signal() => match signal {
                Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
                Err(e) => {
                    tracing::warn!(error = %e, "signal handling unavailable; waiting for quit");
                    self.token.cancelled().await;
                }
            },
        }
        self.token.cancel();

        for (name, task) in [("scheduler", scheduler), ("listener", listener)] {
            if let Err(e) = task.await {
                tracing::warn!(task = name, error = %e, "task ended abnormally");
            }
        }
        console.abort();
        tracing::info!(pending = self.scheduler.pending(), "feed stopped");
    }

    async fn broadcast(&self, message: Message) -> Outcome {
        let kind = message.as_label();
        let report = self.registry.broadcast(&message).await;
        Outcome::Broadcast { kind, report }
    }

    fn track(&self, race: &ScheduledRace) {
        let mut races = self.races.lock();
        races.retain(|_, handles| {
            handles.retain(|h| self.scheduler.is_pending(*h));
            !handles.is_empty()
        });
        races
            .entry(race.component.clone())
            .or_default()
            .extend(race.handles.iter().copied());
    }

    fn abort(&self, component: &str) -> Outcome {
        let handles = self.races.lock().remove(component).unwrap_or_default();
        let cancelled = handles
            .into_iter()
            .filter(|h| self.scheduler.cancel(*h))
            .count();
        tracing::info!(component, cancelled, "race aborted");
        Outcome::Aborted {
            component: component.to_string(),
            cancelled,
        }
    }

    fn active_races(&self) -> usize {
        self.races
            .lock()
            .values()
            .filter(|handles| handles.iter().any(|h| self.scheduler.is_pending(*h)))
            .count()
    }
}
