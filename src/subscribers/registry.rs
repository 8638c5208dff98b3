//! # SubscriberRegistry: fan-out over connected sinks
//!
//! [`SubscriberRegistry`] tracks the sinks currently connected to the feed and
//! distributes each [`Message`] to all of them.
//!
//! ## What it guarantees
//! - A message is encoded **once** per broadcast; every sink gets the same frame.
//! - Sinks are visited in registration order.
//! - Membership is read under one lock for the whole broadcast: the set that
//!   receives a message is the set registered when the broadcast began.
//! - Broadcasts never overlap. Concurrent callers (scheduler driver, console)
//!   queue on one fan-out lock, so every sink sees messages in the same order.
//! - A failing sink never stops delivery to the others and never turns into
//!   an error for the caller.
//!
//! ## Failure handling
//! ```text
//!    broadcast(&Message)
//!        │  encode once
//!        ├──► S1.deliver(frame) ─► Ok        → delivered
//!        ├──► S2.deliver(frame) ─► Closed/Io → warn, evict S2 after the pass
//!        └──► S3.deliver(frame) ─► Full      → warn, frame dropped for S3
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use racefeed::{ChannelSink, Message, SubscriberRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = SubscriberRegistry::new();
//! let (sink, mut rx) = ChannelSink::new("probe", 8);
//! registry.add(Arc::new(sink)).await;
//!
//! let report = registry.broadcast(&Message::raw("hi")).await;
//! assert_eq!(report.delivered, 1);
//! assert_eq!(&rx.recv().await.unwrap()[..], b"\x02hi\x03");
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{Sink, SinkId};
use crate::messages::{encode, Message};

struct Entry {
    id: SinkId,
    sink: Arc<dyn Sink>,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sinks that accepted the frame.
    pub delivered: usize,
    /// Sinks that dropped the frame but stay registered (queue full).
    pub dropped: usize,
    /// Sinks removed because delivery failed.
    pub evicted: Vec<SinkId>,
}

/// Registry of connected sinks.
pub struct SubscriberRegistry {
    entries: RwLock<Vec<Entry>>,
    fanout: Mutex<()>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            fanout: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a registry pre-populated with `sinks`, in order.
    pub fn with_sinks(sinks: Vec<Arc<dyn Sink>>) -> Self {
        let entries = sinks
            .into_iter()
            .enumerate()
            .map(|(i, sink)| Entry {
                id: SinkId(i as u64 + 1),
                sink,
            })
            .collect::<Vec<_>>();
        Self {
            next_id: AtomicU64::new(entries.len() as u64 + 1),
            entries: RwLock::new(entries),
            fanout: Mutex::new(()),
        }
    }

    /// Registers a sink and returns its id.
    ///
    /// Adding the same sink twice registers it twice (and it receives every
    /// frame twice).
    pub async fn add(&self, sink: Arc<dyn Sink>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(sink = %id, name = sink.name(), "sink registered");
        self.entries.write().await.push(Entry { id, sink });
        id
    }

    /// Deregisters a sink. Returns `false` if it was not registered.
    pub async fn remove(&self, id: SinkId) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            tracing::debug!(sink = %id, "sink removed");
        }
        removed
    }

    /// Encodes `message` once and delivers it to every registered sink.
    ///
    /// Broadcasting to an empty registry is a no-op. A call made while another
    /// broadcast is in flight waits for it to finish, evictions included.
    ///
    /// A sink must not broadcast from inside [`Sink::deliver`].
    pub async fn broadcast(&self, message: &Message) -> BroadcastReport {
        let _pass = self.fanout.lock().await;
        let frame = encode(message);
        let mut report = BroadcastReport::default();

        {
            let entries = self.entries.read().await;
            for entry in entries.iter() {
                match entry.sink.deliver(frame.clone()).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) if e.is_disconnect() => {
                        tracing::warn!(
                            sink = %entry.id,
                            name = entry.sink.name(),
                            reason = e.as_label(),
                            "delivery failed; evicting sink"
                        );
                        report.evicted.push(entry.id);
                    }
                    Err(e) => {
                        tracing::warn!(
                            sink = %entry.id,
                            name = entry.sink.name(),
                            reason = e.as_label(),
                            kind = message.as_label(),
                            "frame dropped for sink"
                        );
                        report.dropped += 1;
                    }
                }
            }
        }

        if !report.evicted.is_empty() {
            let mut entries = self.entries.write().await;
            entries.retain(|e| !report.evicted.contains(&e.id));
        }
        report
    }

    /// Number of registered sinks.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if no sink is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Registered ids in registration order.
    pub async fn ids(&self) -> Vec<SinkId> {
        self.entries.read().await.iter().map(|e| e.id).collect()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::subscribers::ChannelSink;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct BrokenSink;

    #[async_trait]
    impl Sink for BrokenSink {
        async fn deliver(&self, _frame: Bytes) -> Result<(), SinkError> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone").into())
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_nobody() {
        let registry = SubscriberRegistry::new();
        let report = registry.broadcast(&Message::raw("x")).await;
        assert_eq!(report, BroadcastReport::default());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_write_failure_isolated_and_evicted() {
        let registry = SubscriberRegistry::new();
        let (first, mut rx1) = ChannelSink::new("first", 8);
        let (third, mut rx3) = ChannelSink::new("third", 8);

        registry.add(Arc::new(first)).await;
        let broken = registry.add(Arc::new(BrokenSink)).await;
        registry.add(Arc::new(third)).await;

        let report = registry.broadcast(&Message::raw("one")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.evicted, vec![broken]);
        assert_eq!(rx1.recv().await.unwrap(), "\x02one\x03");
        assert_eq!(rx3.recv().await.unwrap(), "\x02one\x03");

        assert_eq!(registry.len().await, 2);
        assert!(!registry.ids().await.contains(&broken));

        let report = registry.broadcast(&Message::raw("two")).await;
        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());
    }

    #[tokio::test]
    async fn test_closed_channel_evicted() {
        let registry = SubscriberRegistry::new();
        let (sink, rx) = ChannelSink::new("gone", 8);
        registry.add(Arc::new(sink)).await;
        drop(rx);

        let report = registry.broadcast(&Message::raw("x")).await;
        assert_eq!(report.evicted.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_queue_keeps_sink() {
        let registry = SubscriberRegistry::new();
        let (sink, mut rx) = ChannelSink::new("slow", 1);
        registry.add(Arc::new(sink)).await;

        registry.broadcast(&Message::raw("a")).await;
        let report = registry.broadcast(&Message::raw("b")).await;
        assert_eq!(report.dropped, 1);
        assert_eq!(registry.len().await, 1);

        assert_eq!(rx.recv().await.unwrap(), "\x02a\x03");
        registry.broadcast(&Message::raw("c")).await;
        assert_eq!(rx.recv().await.unwrap(), "\x02c\x03");
    }

    #[tokio::test]
    async fn test_registration_order_and_duplicates() {
        let registry = SubscriberRegistry::new();
        let (sink, mut rx) = ChannelSink::new("twice", 8);
        let sink: Arc<dyn Sink> = Arc::new(sink);
        let a = registry.add(Arc::clone(&sink)).await;
        let b = registry.add(sink).await;
        assert_ne!(a, b);
        assert_eq!(registry.ids().await, vec![a, b]);

        let report = registry.broadcast(&Message::raw("dup")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(rx.recv().await.unwrap(), "\x02dup\x03");
        assert_eq!(rx.recv().await.unwrap(), "\x02dup\x03");
    }

    /// Parks its first frame for a while before accepting it.
    struct SlowFirst {
        seen: parking_lot::Mutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl Sink for SlowFirst {
        async fn deliver(&self, frame: Bytes) -> Result<(), SinkError> {
            let first = self.seen.lock().is_empty();
            if first {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.seen.lock().push(frame);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_broadcasts_keep_one_order() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (fast, mut rx) = ChannelSink::new("fast", 8);
        let slow = Arc::new(SlowFirst {
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        registry.add(Arc::new(fast)).await;
        registry.add(Arc::clone(&slow) as Arc<dyn Sink>).await;

        let first = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.broadcast(&Message::raw("A")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        registry.broadcast(&Message::raw("B")).await;
        first.await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "\x02A\x03");
        assert_eq!(rx.recv().await.unwrap(), "\x02B\x03");
        let slow_seen = slow.seen.lock().clone();
        assert_eq!(slow_seen, vec!["\x02A\x03", "\x02B\x03"]);
    }

    #[tokio::test]
    async fn test_with_sinks_then_add() {
        let (first, _rx1) = ChannelSink::new("first", 1);
        let (second, _rx2) = ChannelSink::new("second", 1);
        let registry = SubscriberRegistry::with_sinks(vec![Arc::new(first), Arc::new(second)]);
        let (late, _rx3) = ChannelSink::new("late", 1);
        let id = registry.add(Arc::new(late)).await;
        assert_eq!(id.get(), 3);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SubscriberRegistry::new();
        let (sink, mut rx) = ChannelSink::new("leaver", 8);
        let id = registry.add(Arc::new(sink)).await;

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);

        registry.broadcast(&Message::raw("late")).await;
        assert!(rx.try_recv().is_err());
    }
}
