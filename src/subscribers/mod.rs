//! # Feed subscribers.
//!
//! This module provides the [`Sink`] trait, the [`SubscriberRegistry`] that
//! fans broadcast frames out to every registered sink, and two built-in
//! sinks.
//!
//! ## Architecture
//! ```text
//! Frame flow:
//!   Scheduler / Console ── broadcast(&Message) ──► SubscriberRegistry
//!                                                       │ encode once
//!                                          ┌────────────┼────────────┐
//!                                          ▼            ▼            ▼
//!                                     ChannelSink  ChannelSink    LogSink
//!                                          │            │        (tracing)
//!                                     conn task    conn task
//!                                      (socket)     (socket)
//! ```
//!
//! ## Implementing custom sinks
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use racefeed::{Sink, SinkError};
//!
//! struct Counter(std::sync::atomic::AtomicUsize);
//!
//! #[async_trait]
//! impl Sink for Counter {
//!     async fn deliver(&self, _frame: Bytes) -> Result<(), SinkError> {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//! ```

mod channel;
mod log;
mod registry;
mod sink;

pub use channel::ChannelSink;
pub use log::LogSink;
pub use registry::{BroadcastReport, SubscriberRegistry};
pub use sink::{Sink, SinkId};
