//! # Jittered gaps between race events.
//!
//! A [`Gap`] is a fixed base plus uniform jitter: `base + U(0, jitter)`, drawn
//! in whole centi-units with both bounds inclusive.
//!
//! - [`Gap::fixed`]: no randomization, exact base
//! - [`Gap::jittered`]: base plus uniform jitter
//!
//! [`RaceTiming`] bundles the gaps a simulated race is built from.

use rand::Rng;

use super::RaceTime;

/// Base delay plus uniform random jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gap {
    /// Always-applied part of the gap.
    pub base: RaceTime,
    /// Upper bound of the random part (inclusive).
    pub jitter: RaceTime,
}

impl Gap {
    /// A gap without randomness.
    pub const fn fixed(base: RaceTime) -> Self {
        Self {
            base,
            jitter: RaceTime::ZERO,
        }
    }

    /// A gap of `base + U(0, jitter)`.
    pub const fn jittered(base: RaceTime, jitter: RaceTime) -> Self {
        Self { base, jitter }
    }

    /// Draws one gap from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RaceTime {
        let max = self.jitter.centis();
        if max == 0 {
            return self.base;
        }
        self.base + RaceTime::from_centis(rng.random_range(0..=max))
    }

    /// Smallest value [`sample`](Self::sample) can return.
    pub fn min(&self) -> RaceTime {
        self.base
    }

    /// Largest value [`sample`](Self::sample) can return.
    pub fn max(&self) -> RaceTime {
        self.base + self.jitter
    }
}

/// Timing of a simulated race, in time units.
///
/// Defaults:
/// - `lead_in = 3` (registered → started)
/// - `split_gap = 5 + U(0, 5)` (before each split's first participant)
/// - `participant_gap = 1 + U(0, 2)` (between consecutive participants)
/// - `results_delay = 5` (finished → final)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaceTiming {
    /// Delay from "registered" to "started".
    pub lead_in: RaceTime,
    /// Gap added to the cursor at the start of every split.
    pub split_gap: Gap,
    /// Gap between participants within a split; also accumulates the delta.
    pub participant_gap: Gap,
    /// Delay from "finished" to "final".
    pub results_delay: RaceTime,
}

impl Default for RaceTiming {
    fn default() -> Self {
        Self {
            lead_in: RaceTime::from_units(3),
            split_gap: Gap::jittered(RaceTime::from_units(5), RaceTime::from_units(5)),
            participant_gap: Gap::jittered(RaceTime::from_units(1), RaceTime::from_units(2)),
            results_delay: RaceTime::from_units(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fixed_gap_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        let gap = Gap::fixed(RaceTime::from_units(3));
        for _ in 0..50 {
            assert_eq!(gap.sample(&mut rng), RaceTime::from_units(3));
        }
    }

    #[test]
    fn test_jittered_gap_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let gap = Gap::jittered(RaceTime::from_units(5), RaceTime::from_units(5));
        for _ in 0..1000 {
            let g = gap.sample(&mut rng);
            assert!(
                g >= gap.min() && g <= gap.max(),
                "gap {g} outside [{}, {}]",
                gap.min(),
                gap.max()
            );
        }
    }

    #[test]
    fn test_jitter_varies() {
        let mut rng = StdRng::seed_from_u64(1);
        let gap = Gap::jittered(RaceTime::from_units(1), RaceTime::from_units(2));
        let first = gap.sample(&mut rng);
        let varied = (0..100).any(|_| gap.sample(&mut rng) != first);
        assert!(varied, "jitter never changed the gap");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let gap = RaceTiming::default().split_gap;
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            assert_eq!(gap.sample(&mut a), gap.sample(&mut b));
        }
    }

    #[test]
    fn test_default_timing() {
        let t = RaceTiming::default();
        assert_eq!(t.lead_in, RaceTime::from_units(3));
        assert_eq!(t.split_gap.max(), RaceTime::from_units(10));
        assert_eq!(t.participant_gap.min(), RaceTime::from_units(1));
        assert_eq!(t.results_delay, RaceTime::from_units(5));
    }
}
