//! Message framing for subscriber transport.
//!
//! # Wire Format
//!
//! Every message is rendered to text and wrapped in control bytes:
//!
//! ```text
//! [0x02 STX] [rendered message text] [0x03 ETX]
//! ```
//!
//! Interior control bytes are not escaped. A `Raw` message containing ETX
//! therefore ends its frame early on the receiving side; consumers of the
//! feed have always lived with this.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::Message;
use crate::error::CodecError;

/// Start-of-text control byte.
pub const STX: u8 = 0x02;
/// End-of-text control byte.
pub const ETX: u8 = 0x03;

/// Default upper bound on a decoded frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Encode a message to wire format.
///
/// Pure and infallible; the registry calls it once per broadcast and shares
/// the resulting buffer between all sinks.
pub fn encode(message: &Message) -> Bytes {
    let text = message.render();
    let mut buf = BytesMut::with_capacity(text.len() + 2);
    put_frame(&text, &mut buf);
    buf.freeze()
}

fn put_frame(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len() + 2);
    dst.put_u8(STX);
    dst.put_slice(text.as_bytes());
    dst.put_u8(ETX);
}

/// STX/ETX codec for use with `tokio_util::codec::{FramedRead, FramedWrite}`.
///
/// Encodes [`Message`]s; decodes frame bodies (without the control bytes).
/// Bytes outside any frame are discarded.
#[derive(Debug, Clone)]
pub struct FeedCodec {
    max_frame_len: usize,
}

impl FeedCodec {
    /// Codec with the default body limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Codec rejecting bodies longer than `max_frame_len` (min 1).
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.max(1),
        }
    }

    /// Configured body limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FeedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<&Message> for FeedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&item.render(), dst);
        Ok(())
    }
}

impl Decoder for FeedCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(start) = src.iter().position(|b| *b == STX) else {
            src.clear();
            return Ok(None);
        };
        src.advance(start);

        match src[1..].iter().position(|b| *b == ETX) {
            Some(len) => {
                src.advance(1);
                let body = src.split_to(len).freeze();
                src.advance(1);
                Ok(Some(body))
            }
            None if src.len() - 1 > self.max_frame_len => {
                src.clear();
                Err(CodecError::FrameTooLong {
                    limit: self.max_frame_len,
                })
            }
            None => Ok(None),
        }
    }
}
