//! # Core sink trait
//!
//! `Sink` is the extension point for anything that receives framed feed
//! bytes: a TCP subscriber, an in-process log, a test probe. The
//! [`SubscriberRegistry`](crate::SubscriberRegistry) calls
//! [`Sink::deliver`] once per broadcast, in registration order.
//!
//! ## Contract
//! - `deliver` should return promptly. Sinks backed by slow I/O queue the
//!   frame and write it elsewhere (see [`ChannelSink`](crate::ChannelSink)).
//! - Returning an error for which [`SinkError::is_disconnect`] holds makes
//!   the registry evict the sink.
//! - [`SinkError::Full`] is the one failure that does not evict: the frame is
//!   lost for that sink only and the sink stays registered, unlike every
//!   other write failure. Such a sink can miss frames that others receive.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;

/// Identity of a registered sink, assigned by the registry on `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SinkId(pub(crate) u64);

impl SinkId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Receiver of framed feed bytes.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Accept one complete frame.
    async fn deliver(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
