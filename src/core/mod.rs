//! Feed core: scheduling, race generation and the service context.
//!
//! Internal modules:
//! - [`config`]: feed settings;
//! - [`scheduler`]: time-ordered pending events, fired through the registry;
//! - [`simulator`]: expands a race into scheduled events;
//! - [`feed`]: owns registry/scheduler/simulator, executes commands, runs the service;
//! - [`builder`]: constructs a [`Feed`];
//! - [`shutdown`]: OS termination signals.

mod builder;
mod config;
mod feed;
mod scheduler;
mod shutdown;
mod simulator;

pub use builder::FeedBuilder;
pub use config::{Config, DEFAULT_PORT};
pub use feed::{Feed, Outcome};
pub use scheduler::{EventHandle, Scheduler};
pub use simulator::{PlannedEvent, RaceLimits, RacePlan, RaceSimulator, ScheduledRace};
