//! # RaceSimulator: expands a race descriptor into scheduled feed events.
//!
//! Given `(component, splits, participants)` the simulator builds the whole
//! race up front as a [`RacePlan`] and hands every event to the
//! [`Scheduler`] relative to one base instant. The caller never waits for the
//! race to run.
//!
//! ## Timeline
//! ```text
//! t=0          STT state=0 (registered)
//! t=lead_in    STT state=1 (started)                cursor = lead_in
//! split 1..=S: cursor += split_gap                   rank = 1, delta = 0
//!   for p in participants:
//!     t=cursor LOG (p, split, elapsed=cursor, rank, delta if rank>1)
//!     rank += 1; gap = participant_gap; delta += gap; cursor += gap
//! t=cursor     STT state=4 (finished)
//! t=cursor+R   STT state=3 (final)
//! ```
//!
//! ## Rules
//! - Zero splits or zero participants are valid races (status events only).
//! - Out-of-range requests are rejected with [`FeedError::InvalidRace`] before
//!   anything is scheduled.
//! - Randomness comes from one seedable generator, so a seeded feed plans the
//!   same races every run.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use super::scheduler::{EventHandle, Scheduler};
use crate::error::FeedError;
use crate::messages::{Message, SplitLog, StateCode};
use crate::timing::{RaceTime, RaceTiming};

/// Largest random split time `logr` produces: 7:59.99.
const RANDOM_ELAPSED_MAX: RaceTime = RaceTime::from_centis(7 * 6000 + 59 * 100 + 99);
/// Largest random rank `logr` produces.
const RANDOM_RANK_MAX: u32 = 6;
/// Largest random delta `logr` produces: 59.99.
const RANDOM_DELTA_MAX: RaceTime = RaceTime::from_centis(59 * 100 + 99);

/// Upper bounds on a simulated race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceLimits {
    /// Largest accepted split count.
    pub max_splits: u32,
    /// Largest accepted participant count.
    pub max_participants: usize,
}

/// One event of a planned race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    /// Offset from the start of the race.
    pub at: RaceTime,
    /// What gets broadcast.
    pub message: Message,
}

/// A fully expanded race, in scheduling order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacePlan {
    /// Component the race belongs to.
    pub component: String,
    /// Events in the order they are handed to the scheduler.
    pub events: Vec<PlannedEvent>,
}

impl RacePlan {
    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the plan has no events (never the case for a valid race).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event.
    pub fn duration(&self) -> RaceTime {
        self.events.iter().map(|e| e.at).max().unwrap_or(RaceTime::ZERO)
    }

    /// Status changes with their offsets.
    pub fn statuses(&self) -> impl Iterator<Item = (RaceTime, StateCode)> + '_ {
        self.events.iter().filter_map(|e| match e.message {
            Message::StatusChange { state, .. } => Some((e.at, state)),
            _ => None,
        })
    }

    /// Split logs with their offsets.
    pub fn splits(&self) -> impl Iterator<Item = (RaceTime, &SplitLog)> + '_ {
        self.events.iter().filter_map(|e| match &e.message {
            Message::SplitLog(log) => Some((e.at, log)),
            _ => None,
        })
    }
}

/// A race handed to the scheduler.
#[derive(Debug, Clone)]
pub struct ScheduledRace {
    /// Component the race belongs to.
    pub component: String,
    /// One handle per scheduled event, in plan order.
    pub handles: Vec<EventHandle>,
    /// Real time until the last event fires.
    pub duration: Duration,
}

/// Builder state of one race while its events are generated.
struct CompetitionRun<'a> {
    component: &'a str,
    timing: &'a RaceTiming,
    cursor: RaceTime,
    events: Vec<PlannedEvent>,
}

impl<'a> CompetitionRun<'a> {
    fn new(component: &'a str, timing: &'a RaceTiming, capacity: usize) -> Self {
        Self {
            component,
            timing,
            cursor: RaceTime::ZERO,
            events: Vec::with_capacity(capacity),
        }
    }

    fn status(&mut self, at: RaceTime, state: StateCode) {
        self.events.push(PlannedEvent {
            at,
            message: Message::status(self.component, state),
        });
    }

    fn start(&mut self) {
        self.status(RaceTime::ZERO, StateCode::REGISTERED);
        self.cursor = self.timing.lead_in;
        self.status(self.cursor, StateCode::STARTED);
    }

    fn split<R, S>(&mut self, index: u32, participants: &[S], rng: &mut R)
    where
        R: Rng + ?Sized,
        S: AsRef<str>,
    {
        self.cursor += self.timing.split_gap.sample(rng);
        let mut delta = RaceTime::ZERO;

        for (rank, participant) in (1u32..).zip(participants) {
            let participant: &str = participant.as_ref();
            let log = SplitLog::new(
                self.component,
                participant,
                index,
                self.cursor,
                rank,
                delta,
            );
            self.events.push(PlannedEvent {
                at: self.cursor,
                message: log.into(),
            });

            let gap = self.timing.participant_gap.sample(rng);
            delta += gap;
            self.cursor += gap;
        }
    }

    fn finish(mut self) -> RacePlan {
        let finished_at = self.cursor;
        self.status(finished_at, StateCode::FINISHED);
        self.status(finished_at + self.timing.results_delay, StateCode::FINAL);
        RacePlan {
            component: self.component.to_string(),
            events: self.events,
        }
    }
}

/// Generates races and single split records.
pub struct RaceSimulator {
    scheduler: Scheduler,
    timing: RaceTiming,
    time_unit: Duration,
    limits: RaceLimits,
    rng: Mutex<StdRng>,
}

impl RaceSimulator {
    /// Creates a simulator feeding `scheduler`.
    ///
    /// `seed = None` seeds from the OS.
    pub fn new(
        scheduler: Scheduler,
        timing: RaceTiming,
        time_unit: Duration,
        limits: RaceLimits,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            scheduler,
            timing,
            time_unit,
            limits,
            rng: Mutex::new(rng),
        }
    }

    /// Expands a race into its events without scheduling anything.
    pub fn plan<S: AsRef<str>>(
        &self,
        component: &str,
        splits: u32,
        participants: &[S],
    ) -> Result<RacePlan, FeedError> {
        self.validate(component, splits, participants)?;

        let capacity = 4 + splits as usize * participants.len();
        let mut run = CompetitionRun::new(component, &self.timing, capacity);
        run.start();
        {
            let mut rng = self.rng.lock();
            for index in 1..=splits {
                run.split(index, participants, &mut *rng);
            }
        }
        Ok(run.finish())
    }

    /// Plans a race and schedules all of its events relative to now.
    pub fn simulate<S: AsRef<str>>(
        &self,
        component: &str,
        splits: u32,
        participants: &[S],
    ) -> Result<ScheduledRace, FeedError> {
        let plan = self.plan(component, splits, participants)?;
        let duration = self.real_delay(plan.duration());
        let base = Instant::now();

        let handles: Vec<EventHandle> = plan
            .events
            .into_iter()
            .map(|e| {
                self.scheduler
                    .schedule_at(base + self.real_delay(e.at), e.message)
            })
            .collect();

        tracing::info!(
            component,
            splits,
            participants = participants.len(),
            events = handles.len(),
            "race scheduled"
        );
        Ok(ScheduledRace {
            component: component.to_string(),
            handles,
            duration,
        })
    }

    /// A single split record with random time, rank and delta.
    pub fn random_split(&self, component: &str, participant: &str, split: u32) -> SplitLog {
        let mut rng = self.rng.lock();
        let elapsed = RaceTime::from_centis(rng.random_range(0..=RANDOM_ELAPSED_MAX.centis()));
        let rank = rng.random_range(1..=RANDOM_RANK_MAX);
        let delta = RaceTime::from_centis(rng.random_range(0..=RANDOM_DELTA_MAX.centis()));
        SplitLog::new(component, participant, split, elapsed, rank, delta)
    }

    /// Timing races are built from.
    pub fn timing(&self) -> &RaceTiming {
        &self.timing
    }

    /// Limits enforced by [`plan`](Self::plan).
    pub fn limits(&self) -> RaceLimits {
        self.limits
    }

    fn real_delay(&self, at: RaceTime) -> Duration {
        at.to_delay(self.time_unit)
    }

    fn validate<S: AsRef<str>>(
        &self,
        component: &str,
        splits: u32,
        participants: &[S],
    ) -> Result<(), FeedError> {
        let invalid = |reason: String| Err(FeedError::InvalidRace { reason });

        if !is_field(component) {
            return invalid(format!("component id {component:?} is not a single field"));
        }
        if splits > self.limits.max_splits {
            return invalid(format!(
                "{splits} splits exceeds the limit of {}",
                self.limits.max_splits
            ));
        }
        if participants.len() > self.limits.max_participants {
            return invalid(format!(
                "{} participants exceeds the limit of {}",
                participants.len(),
                self.limits.max_participants
            ));
        }
        for participant in participants {
            let participant: &str = participant.as_ref();
            if !is_field(participant) {
                return invalid(format!("participant id {participant:?} is not a single field"));
            }
        }
        Ok(())
    }
}

/// Ids end up as `|`-separated wire fields: non-empty, no separator, no
/// whitespace or control bytes.
fn is_field(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c == '|' || c.is_whitespace() || c.is_control())
}
