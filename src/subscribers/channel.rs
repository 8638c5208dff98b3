//! # ChannelSink: bounded queue in front of a slow consumer
//!
//! [`ChannelSink`] hands frames to a bounded `mpsc` queue and returns
//! immediately. Whoever owns the receiving half (a TCP connection task, a
//! test) drains it at its own pace.
//!
//! ## Failure mapping
//! ```text
//! try_send ─► Ok            → delivered
//!          ─► Full          → SinkError::Full   (frame dropped, sink kept)
//!          ─► Closed        → SinkError::Closed (receiver gone, sink evicted)
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::Sink;
use crate::error::SinkError;

/// Sink writing into a bounded queue.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    ///
    /// Capacity is clamped to a minimum of 1.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: name.into(),
                sender,
            },
            rx,
        )
    }

    /// True once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn deliver(&self, frame: Bytes) -> Result<(), SinkError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
