//! TCP side of the feed: accepts subscribers and streams frames to them.

mod listener;

pub use listener::FeedServer;
