//! # Feed messages.
//!
//! [`Message`] is what the feed broadcasts. Three variants:
//! - **StatusChange**: lifecycle stage of a component (`STT0` records)
//! - **SplitLog**: one participant's time at one split (`LOG0` records)
//! - **Raw**: operator text passed through untouched
//!
//! ## Wire text
//! ```text
//! STT0|<component>|<component>|<state>
//! LOG0|<component>|<component>|<participant>|y|<split>|<elapsed>|<rank>|<delta>
//! <raw text>
//! ```
//! The component id appears twice in both tagged records. Consumers expect
//! both fields, so it is kept even though the second never differs.
//!
//! ## Example
//! ```rust
//! use racefeed::{Message, StateCode};
//!
//! let msg = Message::status("K1", StateCode::STARTED);
//! assert_eq!(msg.render(), "STT0|K1|K1|1");
//! ```

use std::fmt;

use crate::timing::RaceTime;

const STATUS_TAG: &str = "STT0";
const SPLIT_TAG: &str = "LOG0";
const SPLIT_FLAG: &str = "y";

/// Lifecycle stage of a component.
///
/// The simulator only emits the four named codes; `stt` accepts any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateCode(pub u8);

impl StateCode {
    /// Registered, not started.
    pub const REGISTERED: StateCode = StateCode(0);
    /// Running.
    pub const STARTED: StateCode = StateCode(1);
    /// Results are final.
    pub const FINAL: StateCode = StateCode(3);
    /// Last participant through the last split.
    pub const FINISHED: StateCode = StateCode(4);
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant's time at one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLog {
    /// Component (race) id.
    pub component: String,
    /// Participant id.
    pub participant: String,
    /// 1-based split index.
    pub split: u32,
    /// Race clock at which the participant passed the split.
    pub elapsed: RaceTime,
    /// 1-based position at this split.
    pub rank: u32,
    /// Gap to the leader; `None` for the leader.
    pub delta: Option<RaceTime>,
}

impl SplitLog {
    /// Builds a split record; `delta` is dropped when `rank == 1`.
    pub fn new(
        component: impl Into<String>,
        participant: impl Into<String>,
        split: u32,
        elapsed: RaceTime,
        rank: u32,
        delta: RaceTime,
    ) -> Self {
        Self {
            component: component.into(),
            participant: participant.into(),
            split,
            elapsed,
            rank,
            delta: (rank > 1).then_some(delta),
        }
    }

    fn delta_text(&self) -> String {
        match self.delta {
            Some(d) if self.rank > 1 => d.as_gap(),
            _ => String::new(),
        }
    }
}

/// A record broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Component moved to a new lifecycle stage.
    StatusChange {
        /// Component (race) id.
        component: String,
        /// New state.
        state: StateCode,
    },
    /// Split time of one participant.
    SplitLog(SplitLog),
    /// Opaque operator text.
    Raw(String),
}

impl Message {
    /// Shorthand for [`Message::StatusChange`].
    pub fn status(component: impl Into<String>, state: StateCode) -> Self {
        Message::StatusChange {
            component: component.into(),
            state,
        }
    }

    /// Shorthand for [`Message::Raw`].
    pub fn raw(text: impl Into<String>) -> Self {
        Message::Raw(text.into())
    }

    /// Component this message belongs to, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            Message::StatusChange { component, .. } => Some(component),
            Message::SplitLog(log) => Some(&log.component),
            Message::Raw(_) => None,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Message::StatusChange { .. } => "status",
            Message::SplitLog(_) => "split",
            Message::Raw(_) => "raw",
        }
    }

    /// Renders the unframed wire text.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::StatusChange { component, state } => {
                write!(f, "{STATUS_TAG}|{component}|{component}|{state}")
            }
            Message::SplitLog(log) => write!(
                f,
                "{SPLIT_TAG}|{c}|{c}|{p}|{SPLIT_FLAG}|{s}|{e}|{r}|{d}",
                c = log.component,
                p = log.participant,
                s = log.split,
                e = log.elapsed.as_clock(),
                r = log.rank,
                d = log.delta_text(),
            ),
            Message::Raw(text) => f.write_str(text),
        }
    }
}

impl From<SplitLog> for Message {
    fn from(log: SplitLog) -> Self {
        Message::SplitLog(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_render() {
        let msg = Message::status("C7", StateCode::FINISHED);
        assert_eq!(msg.render(), "STT0|C7|C7|4");
        assert_eq!(msg.component(), Some("C7"));
    }

    #[test]
    fn test_leader_split_has_empty_delta() {
        let log = SplitLog::new("A", "x", 1, RaceTime::from_centis(845), 1, RaceTime::from_units(9));
        assert_eq!(log.delta, None);
        assert_eq!(Message::from(log).render(), "LOG0|A|A|x|y|1|08.45|1|");
    }

    #[test]
    fn test_chaser_split_has_delta() {
        let log = SplitLog::new(
            "A",
            "y",
            2,
            RaceTime::from_centis(6412),
            2,
            RaceTime::from_centis(137),
        );
        assert_eq!(Message::from(log).render(), "LOG0|A|A|y|y|2|1:04.12|2|+1.37");
    }

    #[test]
    fn test_delta_hidden_for_leader_even_if_set() {
        let mut log = SplitLog::new("A", "x", 1, RaceTime::ZERO, 2, RaceTime::from_units(1));
        log.rank = 1;
        assert!(Message::from(log).render().ends_with("|1|"));
    }

    #[test]
    fn test_raw_is_verbatim() {
        let msg = Message::raw("LOG0|not|parsed");
        assert_eq!(msg.render(), "LOG0|not|parsed");
        assert_eq!(msg.component(), None);
        assert_eq!(msg.as_label(), "raw");
    }
}
