//! # Scheduler: delayed broadcast of feed messages.
//!
//! The [`Scheduler`] holds every pending event of the feed on one timeline and
//! broadcasts each through the [`SubscriberRegistry`] when its time comes.
//!
//! ## Architecture
//! ```text
//! schedule(delay, msg) ──► Queue (min-heap on (fire_at, seq)) ──notify──┐
//! cancel(handle)       ──► Queue.live -= handle                         │
//!                                                                       ▼
//! Scheduler::run()  loop {
//!   ├─► fire_due(): pop every event with fire_at <= now, in order
//!   │        └─► registry.broadcast(&msg).await   (one at a time)
//!   └─► wait for: next fire_at | new schedule (Notify) | cancellation
//! }
//! ```
//!
//! ## Rules
//! - Events fire in non-decreasing `fire_at`; ties fire in scheduling order.
//! - Each broadcast completes before the next event fires.
//! - `schedule` may be called at any time, including while events are firing;
//!   a zero-delay event scheduled mid-pass fires in the same pass.
//! - The queue lock is never held across an `.await`.
//! - Cancelled events are dropped lazily when they reach the head of the heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::messages::Message;
use crate::subscribers::SubscriberRegistry;

/// Upper bound on how far ahead an event can be placed (~30 years).
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Handle to a scheduled event; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

impl EventHandle {
    /// Scheduling sequence number (unique per scheduler, increasing).
    pub fn seq(self) -> u64 {
        self.0
    }
}

/// One pending event.
#[derive(Debug)]
struct Pending {
    fire_at: Instant,
    seq: u64,
    message: Message,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    /// Reversed so that `BinaryHeap` pops the earliest `(fire_at, seq)` first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Pending>,
    live: HashSet<u64>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, fire_at: Instant, message: Message) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(seq);
        self.heap.push(Pending {
            fire_at,
            seq,
            message,
        });
        EventHandle(seq)
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if self.live.contains(&head.seq) {
                break;
            }
            self.heap.pop();
        }
    }

    fn next_fire_at(&mut self) -> Option<Instant> {
        self.discard_cancelled_head();
        self.heap.peek().map(|p| p.fire_at)
    }

    fn pop_due(&mut self, now: Instant) -> Option<Pending> {
        self.discard_cancelled_head();
        if self.heap.peek()?.fire_at > now {
            return None;
        }
        let event = self.heap.pop()?;
        self.live.remove(&event.seq);
        Some(event)
    }
}

struct Inner {
    queue: Mutex<Queue>,
    wake: Notify,
    registry: Arc<SubscriberRegistry>,
}

/// Timeline of pending feed events.
///
/// Cheap to clone; all clones share the same queue. Exactly one task should
/// drive it via [`Scheduler::run`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler broadcasting through `registry`.
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Queue::default()),
                wake: Notify::new(),
                registry,
            }),
        }
    }

    /// Schedules `message` to be broadcast `delay` from now.
    pub fn schedule(&self, delay: Duration, message: Message) -> EventHandle {
        self.schedule_at(deadline_after(Instant::now(), delay), message)
    }

    /// Schedules `message` to be broadcast at `fire_at`.
    ///
    /// An instant in the past is due immediately.
    pub fn schedule_at(&self, fire_at: Instant, message: Message) -> EventHandle {
        let handle = self.inner.queue.lock().push(fire_at, message);
        self.inner.wake.notify_one();
        handle
    }

    /// Prevents a pending event from firing.
    ///
    /// Returns `false` if the event already fired or was already cancelled.
    pub fn cancel(&self, handle: EventHandle) -> bool {
        let cancelled = self.inner.queue.lock().live.remove(&handle.0);
        if cancelled {
            self.inner.wake.notify_one();
        }
        cancelled
    }

    /// True while the event has neither fired nor been cancelled.
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.inner.queue.lock().live.contains(&handle.0)
    }

    /// Number of events waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().live.len()
    }

    /// Registry events are broadcast through.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.inner.registry
    }

    /// Spawns [`Scheduler::run`] on the current runtime.
    pub fn spawn(&self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(token))
    }

    /// Drives the timeline until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        loop {
            self.fire_due().await;

            let next = self.inner.queue.lock().next_fire_at();
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                _ = sleep_until(next) => {}
            }
        }
        tracing::debug!(pending = self.pending(), "scheduler stopped");
    }

    /// Broadcasts every event that is due, in order. Returns how many fired.
    pub async fn fire_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let due = self.inner.queue.lock().pop_due(Instant::now());
            let Some(event) = due else { break };

            let report = self.inner.registry.broadcast(&event.message).await;
            tracing::debug!(
                seq = event.seq,
                kind = event.message.as_label(),
                delivered = report.delivered,
                "event fired"
            );
            fired += 1;
        }
        fired
    }
}

fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now + delay.min(FAR_FUTURE)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::ChannelSink;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<Bytes>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(String::from_utf8_lossy(&frame[1..frame.len() - 1]).into_owned());
        }
        out
    }

    async fn setup() -> (Scheduler, mpsc::Receiver<Bytes>, CancellationToken) {
        let registry = Arc::new(SubscriberRegistry::new());
        let (sink, rx) = ChannelSink::new("probe", 64);
        registry.add(Arc::new(sink)).await;
        let scheduler = Scheduler::new(registry);
        let token = CancellationToken::new();
        scheduler.spawn(token.clone());
        (scheduler, rx, token)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_in_delay_order() {
        let (sched, mut rx, _token) = setup().await;

        sched.schedule(Duration::from_secs(30), Message::raw("late"));
        sched.schedule(Duration::from_secs(10), Message::raw("early"));
        sched.schedule(Duration::from_secs(20), Message::raw("mid"));

        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(drain(&mut rx), vec!["early"]);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(drain(&mut rx), vec!["mid", "late"]);
        assert_eq!(sched.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_fire_in_schedule_order() {
        let (sched, mut rx, _token) = setup().await;
        let at = Instant::now() + Duration::from_secs(5);

        for name in ["first", "second", "third"] {
            sched.schedule_at(at, Message::raw(name));
        }

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(drain(&mut rx), vec!["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_early() {
        let (sched, mut rx, _token) = setup().await;
        sched.schedule(Duration::from_secs(10), Message::raw("x"));

        time::sleep(Duration::from_secs(9)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sched.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (sched, mut rx, _token) = setup().await;
        let keep = sched.schedule(Duration::from_secs(1), Message::raw("keep"));
        let gone = sched.schedule(Duration::from_secs(2), Message::raw("gone"));

        assert!(sched.cancel(gone));
        assert!(!sched.cancel(gone));
        assert!(!sched.is_pending(gone));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(drain(&mut rx), vec!["keep"]);
        assert!(!sched.cancel(keep), "cancelling a fired event is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_head_does_not_block_later_events() {
        let (sched, mut rx, _token) = setup().await;
        let head = sched.schedule(Duration::from_secs(1), Message::raw("head"));
        sched.schedule(Duration::from_secs(2), Message::raw("tail"));
        sched.cancel(head);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(drain(&mut rx), vec!["tail"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_while_waiting_wakes_driver() {
        let (sched, mut rx, _token) = setup().await;
        sched.schedule(Duration::from_secs(100), Message::raw("far"));
        time::sleep(Duration::from_secs(1)).await;

        sched.schedule(Duration::from_secs(1), Message::raw("near"));
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(drain(&mut rx), vec!["near"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_fires_promptly() {
        let (sched, mut rx, _token) = setup().await;
        sched.schedule(Duration::ZERO, Message::raw("now"));
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(drain(&mut rx), vec!["now"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_schedulers_share_timeline() {
        let (sched, mut rx, _token) = setup().await;
        let other = sched.clone();
        let handle = tokio::spawn(async move {
            other.schedule(Duration::from_secs(2), Message::raw("from-task"));
        });
        sched.schedule(Duration::from_secs(1), Message::raw("from-test"));
        handle.await.unwrap();

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(drain(&mut rx), vec!["from-test", "from-task"]);
    }

    /// Schedules a follow-up event when it sees `first`.
    struct Chain {
        scheduler: parking_lot::Mutex<Option<Scheduler>>,
        out: mpsc::Sender<Bytes>,
    }

    #[async_trait::async_trait]
    impl crate::subscribers::Sink for Chain {
        async fn deliver(&self, frame: Bytes) -> Result<(), crate::error::SinkError> {
            if &frame[..] == b"\x02first\x03" {
                if let Some(sched) = self.scheduler.lock().as_ref() {
                    sched.schedule(Duration::ZERO, Message::raw("second"));
                    sched.schedule(Duration::from_secs(1), Message::raw("third"));
                }
            }
            let _ = self.out.try_send(frame);
            Ok(())
        }
    }

    fn chained() -> (Scheduler, mpsc::Receiver<Bytes>) {
        let (out, rx) = mpsc::channel(8);
        let chain = Arc::new(Chain {
            scheduler: parking_lot::Mutex::new(None),
            out,
        });
        let registry = Arc::new(SubscriberRegistry::with_sinks(vec![
            Arc::clone(&chain) as Arc<dyn crate::subscribers::Sink>
        ]));
        let sched = Scheduler::new(registry);
        *chain.scheduler.lock() = Some(sched.clone());
        (sched, rx)
    }

    #[tokio::test]
    async fn test_schedule_from_inside_firing_joins_same_pass() {
        let (sched, mut rx) = chained();
        sched.schedule(Duration::ZERO, Message::raw("first"));

        assert_eq!(sched.fire_due().await, 2);
        assert_eq!(drain(&mut rx), vec!["first", "second"]);
        assert_eq!(sched.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_from_inside_firing_with_driver() {
        let (sched, mut rx) = chained();
        let _driver = sched.spawn(CancellationToken::new());
        sched.schedule(Duration::from_secs(2), Message::raw("first"));

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(drain(&mut rx), vec!["first", "second"]);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), vec!["third"]);
        assert_eq!(sched.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_join_and_early_leave() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (early, mut early_rx) = ChannelSink::new("early", 8);
        let early_id = registry.add(Arc::new(early)).await;

        let sched = Scheduler::new(Arc::clone(&registry));
        let _driver = sched.spawn(CancellationToken::new());
        sched.schedule(Duration::from_secs(5), Message::raw("event"));

        let (late, mut late_rx) = ChannelSink::new("late", 8);
        registry.add(Arc::new(late)).await;
        registry.remove(early_id).await;

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(drain(&mut late_rx), vec!["event"]);
        assert!(drain(&mut early_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_cancel() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sched = Scheduler::new(registry);
        let token = CancellationToken::new();
        let driver = sched.spawn(token.clone());

        sched.schedule(Duration::from_secs(60), Message::raw("never"));
        token.cancel();
        driver.await.unwrap();
        assert_eq!(sched.pending(), 1);
    }

    #[tokio::test]
    async fn test_fire_due_without_driver() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (sink, mut rx) = ChannelSink::new("probe", 8);
        registry.add(Arc::new(sink)).await;
        let sched = Scheduler::new(registry);

        sched.schedule(Duration::ZERO, Message::raw("a"));
        sched.schedule(Duration::from_secs(3600), Message::raw("b"));
        assert_eq!(sched.fire_due().await, 1);
        assert_eq!(drain(&mut rx), vec!["a"]);
    }

    #[test]
    fn test_deadline_saturates() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::MAX), now + FAR_FUTURE);
    }
}
