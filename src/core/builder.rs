use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::feed::Feed;
use super::scheduler::Scheduler;
use super::simulator::{RaceLimits, RaceSimulator};
use crate::subscribers::{LogSink, Sink, SubscriberRegistry};

/// Builder for constructing a [`Feed`].
pub struct FeedBuilder {
    cfg: Config,
    sinks: Vec<Arc<dyn Sink>>,
    seed: Option<u64>,
}

impl FeedBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            sinks: Vec::new(),
            seed: None,
        }
    }

    /// Sinks registered before any TCP subscriber connects.
    ///
    /// They stay registered for the feed's lifetime unless delivery to them fails.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn Sink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Seeds the race generator; the same seed plans the same races.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the feed.
    ///
    /// Nothing runs until [`Feed::run`] (or a manual [`Scheduler::spawn`]).
    pub fn build(self) -> Arc<Feed> {
        let mut sinks = self.sinks;
        if self.cfg.echo_feed {
            sinks.push(Arc::new(LogSink::new()));
        }

        let registry = Arc::new(SubscriberRegistry::with_sinks(sinks));
        let scheduler = Scheduler::new(Arc::clone(&registry));
        let simulator = RaceSimulator::new(
            scheduler.clone(),
            self.cfg.timing,
            self.cfg.time_unit,
            RaceLimits {
                max_splits: self.cfg.max_splits,
                max_participants: self.cfg.max_participants,
            },
            self.seed,
        );

        Arc::new(Feed::new_internal(
            self.cfg,
            registry,
            scheduler,
            simulator,
            CancellationToken::new(),
        ))
    }
}
