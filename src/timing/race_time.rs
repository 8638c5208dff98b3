//! # Race clock values.
//!
//! [`RaceTime`] counts hundredths of a time unit ("centi-units"). The race
//! simulator does all of its arithmetic on it, so split times render exactly
//! and never drift through float accumulation. Converting to a real delay is
//! the only place the configured time unit enters.
//!
//! ## Rendering
//! ```text
//! elapsed (as_clock):  8.05 → "08.05"     75.5 → "1:15.50"
//! delta   (as_gap):    1.37 → "+1.37"     61.0 → "+1:01.00"
//! ```

use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

const CENTIS_PER_UNIT: u64 = 100;
const SECONDS_PER_MINUTE: u64 = 60;

/// A point or span on the race clock, in centi-units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RaceTime(u64);

impl RaceTime {
    /// Start of the race clock.
    pub const ZERO: RaceTime = RaceTime(0);

    /// Whole time units.
    #[inline]
    pub const fn from_units(units: u64) -> Self {
        RaceTime(units.saturating_mul(CENTIS_PER_UNIT))
    }

    /// Hundredths of a time unit.
    #[inline]
    pub const fn from_centis(centis: u64) -> Self {
        RaceTime(centis)
    }

    /// Raw centi-unit value.
    #[inline]
    pub const fn centis(self) -> u64 {
        self.0
    }

    /// Converts to a real delay given the length of one time unit.
    ///
    /// Saturates instead of overflowing for absurdly long races.
    pub fn to_delay(self, unit: Duration) -> Duration {
        let centis = u32::try_from(self.0).unwrap_or(u32::MAX);
        unit.saturating_mul(centis) / CENTIS_PER_UNIT as u32
    }

    /// Elapsed-time form: `M:SS.ss` from one minute on, `SS.ss` below.
    pub fn as_clock(self) -> String {
        let (secs, frac) = self.split();
        if secs >= SECONDS_PER_MINUTE {
            format!(
                "{}:{:02}.{:02}",
                secs / SECONDS_PER_MINUTE,
                secs % SECONDS_PER_MINUTE,
                frac
            )
        } else {
            format!("{secs:02}.{frac:02}")
        }
    }

    /// Delta form: `+` prefixed, seconds unpadded below one minute.
    pub fn as_gap(self) -> String {
        let (secs, frac) = self.split();
        if secs >= SECONDS_PER_MINUTE {
            format!(
                "+{}:{:02}.{:02}",
                secs / SECONDS_PER_MINUTE,
                secs % SECONDS_PER_MINUTE,
                frac
            )
        } else {
            format!("+{secs}.{frac:02}")
        }
    }

    fn split(self) -> (u64, u64) {
        (self.0 / CENTIS_PER_UNIT, self.0 % CENTIS_PER_UNIT)
    }
}

impl Add for RaceTime {
    type Output = RaceTime;

    fn add(self, rhs: RaceTime) -> RaceTime {
        RaceTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for RaceTime {
    fn add_assign(&mut self, rhs: RaceTime) {
        *self = *self + rhs;
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_clock())
    }
}
