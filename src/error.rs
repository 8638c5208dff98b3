//! Error types used by the racefeed core, console and server.
//!
//! This module defines four enums:
//!
//! - [`FeedError`]: errors raised by feed operations (race validation, listener setup).
//! - [`CommandError`]: malformed operator commands; echoed back, never broadcast.
//! - [`SinkError`]: a single subscriber failed to accept a frame.
//! - [`CodecError`]: frame decoding failures.
//!
//! Every type provides `as_label` (stable snake_case, for log fields).
//! [`FeedError`] and [`CommandError`] also provide `as_message`.

use std::net::SocketAddr;

use thiserror::Error;

/// # Errors produced by feed operations.
///
/// None of these are fatal to a running feed except [`FeedError::Bind`],
/// which can only happen while the listener is being set up.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FeedError {
    /// Simulation parameters were rejected before anything was scheduled.
    #[error("invalid race: {reason}")]
    InvalidRace {
        /// Why the request was rejected.
        reason: String,
    },

    /// The TCP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Console or socket I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operator sent a malformed command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl FeedError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use racefeed::FeedError;
    ///
    /// let err = FeedError::InvalidRace { reason: "too many splits".into() };
    /// assert_eq!(err.as_label(), "feed_invalid_race");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FeedError::InvalidRace { .. } => "feed_invalid_race",
            FeedError::Bind { .. } => "feed_bind_failed",
            FeedError::Io(_) => "feed_io",
            FeedError::Command(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            FeedError::InvalidRace { reason } => format!("race rejected: {reason}"),
            FeedError::Bind { addr, source } => format!("bind {addr}: {source}"),
            FeedError::Io(e) => format!("io: {e}"),
            FeedError::Command(e) => e.as_message(),
        }
    }
}

/// # Errors produced while parsing an operator command line.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The first word is not a known command.
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// A required argument is missing.
    #[error("{command}: missing <{argument}>")]
    MissingArgument {
        /// Command keyword.
        command: &'static str,
        /// Name of the missing argument.
        argument: &'static str,
    },

    /// An argument could not be parsed.
    #[error("{command}: invalid <{argument}> '{value}'")]
    InvalidArgument {
        /// Command keyword.
        command: &'static str,
        /// Name of the offending argument.
        argument: &'static str,
        /// The raw value as typed.
        value: String,
    },

    /// More arguments were supplied than the command accepts.
    #[error("{command}: unexpected argument '{value}'")]
    UnexpectedArgument {
        /// Command keyword.
        command: &'static str,
        /// First surplus value.
        value: String,
    },
}

impl CommandError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use racefeed::CommandError;
    ///
    /// let err = CommandError::Unknown("jump".into());
    /// assert_eq!(err.as_label(), "command_unknown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CommandError::Unknown(_) => "command_unknown",
            CommandError::MissingArgument { .. } => "command_missing_argument",
            CommandError::InvalidArgument { .. } => "command_invalid_argument",
            CommandError::UnexpectedArgument { .. } => "command_unexpected_argument",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Delivery failure of a single sink.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink's consumer is gone (connection closed).
    #[error("sink closed")]
    Closed,

    /// The sink's queue is full; this frame was dropped for it.
    #[error("sink queue full")]
    Full,

    /// Writing to the sink failed.
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Closed => "sink_closed",
            SinkError::Full => "sink_full",
            SinkError::Io(_) => "sink_io",
        }
    }

    /// Indicates whether the failure means the sink is gone for good.
    ///
    /// Returns `true` for [`SinkError::Closed`] and [`SinkError::Io`]; a full
    /// queue only loses the current frame.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SinkError::Closed | SinkError::Io(_))
    }
}

/// # Frame decoding failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodecError {
    /// A frame body grew past the configured limit without an ETX.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLong {
        /// Configured maximum body length.
        limit: usize,
    },

    /// Underlying transport failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CodecError::FrameTooLong { .. } => "codec_frame_too_long",
            CodecError::Io(_) => "codec_io",
        }
    }
}
