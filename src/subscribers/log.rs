//! # LogSink: feed echo
//!
//! A minimal sink that logs every broadcast frame through `tracing`.
//! Enabled by `--echo-feed`; useful to watch a race without a TCP client.
//!
//! ## Example output
//! ```text
//! INFO racefeed::feed: frame="STT0|K1|K1|0"
//! INFO racefeed::feed: frame="LOG0|K1|K1|7|y|1|09.12|1|"
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;
use crate::messages::{ETX, STX};
use crate::subscribers::Sink;

/// Frame logger.
#[derive(Default)]
pub struct LogSink;

impl LogSink {
    /// Construct a new [`LogSink`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn deliver(&self, frame: Bytes) -> Result<(), SinkError> {
        let body = frame
            .strip_prefix(&[STX])
            .and_then(|b| b.strip_suffix(&[ETX]))
            .unwrap_or(&frame[..]);
        tracing::info!(target: "racefeed::feed", frame = %String::from_utf8_lossy(body));
        Ok(())
    }

    fn name(&self) -> &str {
        "LogSink"
    }
}
