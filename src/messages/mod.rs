//! Feed messages: data model and wire framing.
//!
//! ## Contents
//! - [`Message`], [`SplitLog`], [`StateCode`] what the feed broadcasts
//! - [`encode`], [`FeedCodec`] STX/ETX framing for subscribers
//!
//! ## Quick reference
//! - **Producers**: the race simulator (via the scheduler) and console commands.
//! - **Consumer**: [`SubscriberRegistry::broadcast`](crate::SubscriberRegistry::broadcast),
//!   which encodes once and fans the frame out.

mod codec;
mod message;

pub use codec::{encode, FeedCodec, DEFAULT_MAX_FRAME_LEN, ETX, STX};
pub use message::{Message, SplitLog, StateCode};
