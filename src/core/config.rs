//! # Feed configuration.
//!
//! Provides [`Config`] centralized settings for the feed runtime.
//!
//! Config is used in two ways:
//! 1. **Feed creation**: `FeedBuilder::new(config).build()`
//! 2. **Server setup**: listen address, per-subscriber queue size, frame limit
//!
//! ## Sentinel values
//! - `sink_queue_capacity = 0` → clamped to 1
//! - `max_frame_len = 0` → clamped to 1
//! - `time_unit = 0s` → every scheduled event is due immediately (still in order)

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::messages::DEFAULT_MAX_FRAME_LEN;
use crate::timing::RaceTiming;

/// Port subscribers connect to by default.
pub const DEFAULT_PORT: u16 = 9000;

/// Global configuration for the feed.
///
/// ## Field semantics
/// - `listen`: TCP address subscribers connect to
/// - `time_unit`: real duration of one race time unit (1s = real time)
/// - `timing`: gaps a simulated race is built from, in time units
/// - `max_splits` / `max_participants`: upper bounds for `sim`; larger requests are rejected
/// - `sink_queue_capacity`: frames buffered per subscriber before frames are dropped
/// - `max_frame_len`: decoder limit for frame bodies
/// - `echo_feed`: register a [`LogSink`](crate::LogSink) that logs every frame
/// - `prompt`: console prompt
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the subscriber listener binds to.
    pub listen: SocketAddr,

    /// Real duration of one race time unit.
    ///
    /// Scales every scheduled delay; shrink it to fast-forward races.
    pub time_unit: Duration,

    /// Lead-in, split/participant gaps and results delay.
    pub timing: RaceTiming,

    /// Largest accepted split count for one simulated race.
    pub max_splits: u32,

    /// Largest accepted participant list for one simulated race.
    pub max_participants: usize,

    /// Bounded queue size of each subscriber.
    ///
    /// A subscriber that falls this far behind loses frames (warn) but stays
    /// connected, unlike a write failure, which evicts it. Frames dropped
    /// this way are not redelivered. Minimum value is 1.
    pub sink_queue_capacity: usize,

    /// Largest frame body the codec decodes.
    pub max_frame_len: usize,

    /// Log every broadcast frame.
    pub echo_feed: bool,

    /// Console prompt.
    pub prompt: String,
}

impl Config {
    /// Returns a per-subscriber queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn sink_capacity_clamped(&self) -> usize {
        self.sink_queue_capacity.max(1)
    }

    /// Returns a frame length limit clamped to a minimum of 1.
    #[inline]
    pub fn max_frame_len_clamped(&self) -> usize {
        self.max_frame_len.max(1)
    }

    /// Same config listening on `port` of the current host.
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen.set_port(port);
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `listen = 0.0.0.0:9000`
    /// - `time_unit = 1s` (real time)
    /// - `timing = RaceTiming::default()` (3 / 5+U(0,5) / 1+U(0,2) / 5)
    /// - `max_splits = 100`, `max_participants = 256`
    /// - `sink_queue_capacity = 1024`
    /// - `max_frame_len = 64 KiB`
    /// - `echo_feed = false`
    /// - `prompt = ">>> "`
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            time_unit: Duration::from_secs(1),
            timing: RaceTiming::default(),
            max_splits: 100,
            max_participants: 256,
            sink_queue_capacity: 1024,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            echo_feed: false,
            prompt: ">>> ".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.time_unit, Duration::from_secs(1));
        assert_eq!(cfg.prompt, ">>> ");
    }

    #[test]
    fn test_clamps() {
        let cfg = Config {
            sink_queue_capacity: 0,
            max_frame_len: 0,
            ..Config::default()
        };
        assert_eq!(cfg.sink_capacity_clamped(), 1);
        assert_eq!(cfg.max_frame_len_clamped(), 1);
    }

    #[test]
    fn test_with_port() {
        let cfg = Config::default().with_port(0);
        assert_eq!(cfg.listen.port(), 0);
    }
}
