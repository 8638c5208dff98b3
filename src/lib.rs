//! # racefeed
//!
//! **racefeed** simulates a live race timing feed.
//!
//! An operator types commands on a console; the feed expands them into
//! status changes and split-time records and broadcasts them, STX/ETX framed,
//! to every connected TCP subscriber at realistic relative times.
//!
//! ## Architecture
//! ```text
//!   operator ──► Console ──► Feed::execute(Command)
//!                               │
//!            ┌──────────────────┼─────────────────────┐
//!            ▼                  ▼                     ▼
//!     raw / stt / logr     sim (RaceSimulator)     abort
//!      (broadcast now)          │ plan: N events      │ cancel handles
//!            │                  ▼                     ▼
//!            │        ┌──────────────────────────────────┐
//!            │        │ Scheduler (min-heap on time,seq) │
//!            │        └────────────────┬─────────────────┘
//!            │                         │ fires in order
//!            ▼                         ▼
//!     ┌─────────────────────────────────────────────────┐
//!     │ SubscriberRegistry::broadcast  (encode once)    │
//!     └────────┬───────────────┬───────────────┬────────┘
//!              ▼               ▼               ▼
//!         ChannelSink     ChannelSink       LogSink
//!              │               │          (--echo-feed)
//!         TCP client      TCP client
//! ```
//!
//! ## Wire format
//! ```text
//! 0x02 STT0|<component>|<component>|<state> 0x03
//! 0x02 LOG0|<component>|<component>|<participant>|y|<split>|<elapsed>|<rank>|<delta> 0x03
//! 0x02 <raw text> 0x03
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                  |
//! |-----------------|----------------------------------------------------------|--------------------------------------------|
//! | **Messages**    | Feed records and their framing.                          | [`Message`], [`SplitLog`], [`FeedCodec`]   |
//! | **Subscribers** | Fan-out to sinks with failure isolation.                 | [`SubscriberRegistry`], [`Sink`]           |
//! | **Scheduling**  | Cancellable, time-ordered delayed broadcast.             | [`Scheduler`], [`EventHandle`]             |
//! | **Simulation**  | Whole races from one command, seedable.                  | [`RaceSimulator`], [`RacePlan`]            |
//! | **Service**     | Console, TCP server, shutdown.                           | [`Feed`], [`FeedBuilder`], [`FeedServer`]  |
//! | **Errors**      | Typed errors with stable labels.                         | [`FeedError`], [`CommandError`]            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use racefeed::{ChannelSink, Command, Config, FeedBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), racefeed::FeedError> {
//!     let feed = FeedBuilder::new(Config::default()).with_rng_seed(1).build();
//!
//!     let (sink, mut rx) = ChannelSink::new("probe", 16);
//!     feed.registry().add(Arc::new(sink)).await;
//!
//!     feed.execute("stt K1 1".parse::<Command>()?).await?;
//!     assert_eq!(&rx.recv().await.unwrap()[..], b"\x02STT0|K1|K1|1\x03");
//!
//!     let plan = feed.simulator().plan("K1", 2, &["a", "b"])?;
//!     assert_eq!(plan.len(), 8);
//!     Ok(())
//! }
//! ```

mod console;
mod core;
mod error;
mod messages;
mod server;
mod subscribers;
mod timing;

// ---- Public re-exports ----

pub use console::{run_console, Command, USAGE};
pub use crate::core::{
    Config, EventHandle, Feed, FeedBuilder, Outcome, PlannedEvent, RaceLimits, RacePlan,
    RaceSimulator, ScheduledRace, Scheduler, DEFAULT_PORT,
};
pub use error::{CodecError, CommandError, FeedError, SinkError};
pub use messages::{encode, FeedCodec, Message, SplitLog, StateCode, DEFAULT_MAX_FRAME_LEN, ETX, STX};
pub use server::FeedServer;
pub use subscribers::{BroadcastReport, ChannelSink, LogSink, Sink, SinkId, SubscriberRegistry};
pub use timing::{Gap, RaceTime, RaceTiming};
