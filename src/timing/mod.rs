//! Race clock and jittered gaps.
//!
//! - [`RaceTime`] centi-unit race clock with the feed's time renderings
//! - [`Gap`], [`RaceTiming`] how far apart simulated events are placed

mod gap;
mod race_time;

pub use gap::{Gap, RaceTiming};
pub use race_time::RaceTime;
