//! Progress event bus.
//!
//! A process-wide keyed pub/sub mechanism with no knowledge of scan
//! semantics: one bounded FIFO queue per channel key. The registry lock
//! covers only channel creation and lookup; enqueue/dequeue contend only
//! on the individual channel's queue. Consumers poll with a bounded wait
//! and receive a synthetic heartbeat when the wait expires empty, so a
//! streaming transport can keep its connection alive.
//!
//! Queues are bounded with drop-oldest eviction, and channels idle past a
//! configurable age can be evicted, so a slow or absent consumer cannot
//! accumulate events without limit.

pub mod event;

pub use event::{EventKind, ProgressEvent};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Default per-channel queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default bounded wait for [`EventBus::next_event`].
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle age after which a channel is eligible for eviction.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(30 * 60);

/// One channel's FIFO queue.
struct ChannelQueue {
    events: Mutex<ChannelState>,
    notify: Notify,
    capacity: usize,
}

struct ChannelState {
    queue: VecDeque<ProgressEvent>,
    /// Events evicted because the queue was full.
    dropped: u64,
    last_activity: Instant,
}

impl ChannelQueue {
    fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                dropped: 0,
                last_activity: Instant::now(),
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    fn push(&self, event: ProgressEvent) {
        {
            let mut state = self.events.lock().expect("channel queue poisoned");
            if state.queue.len() >= self.capacity {
                state.queue.pop_front();
                state.dropped += 1;
            }
            state.queue.push_back(event);
            state.last_activity = Instant::now();
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<ProgressEvent> {
        let mut state = self.events.lock().expect("channel queue poisoned");
        let event = state.queue.pop_front();
        if event.is_some() {
            state.last_activity = Instant::now();
        }
        event
    }

    fn idle_for(&self) -> Duration {
        let state = self.events.lock().expect("channel queue poisoned");
        state.last_activity.elapsed()
    }

    fn dropped(&self) -> u64 {
        self.events.lock().expect("channel queue poisoned").dropped
    }
}

/// Keyed registry of progress event channels.
///
/// Cheap to clone; clones share the underlying registry. Instantiate one
/// per test for isolation instead of reaching for a global.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<String, Arc<ChannelQueue>>>>,
    capacity: usize,
    max_idle: Duration,
}

impl EventBus {
    /// Create a bus with default capacity and idle-eviction settings.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_IDLE)
    }

    /// Create a bus with an explicit per-channel capacity and idle cutoff.
    pub fn with_capacity(capacity: usize, max_idle: Duration) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            max_idle,
        }
    }

    /// Get or create the queue for `channel`.
    fn channel(&self, channel: &str) -> Arc<ChannelQueue> {
        let mut map = self.channels.lock().expect("bus registry poisoned");
        map.entry(channel.to_string())
            .or_insert_with(|| Arc::new(ChannelQueue::new(self.capacity)))
            .clone()
    }

    /// Publish an event to a channel, creating the channel if needed.
    ///
    /// Multiple producers may publish to the same channel concurrently;
    /// ordering within a channel is FIFO.
    pub fn publish(&self, channel: &str, event: ProgressEvent) {
        let queue = self.channel(channel);
        debug!(channel, kind = ?event.kind, stage = ?event.stage, "publish event");
        queue.push(event);
    }

    /// Take the next event from `channel`, waiting up to `timeout`.
    ///
    /// Returns a queued event immediately when one is present; otherwise
    /// waits for a publish and returns a heartbeat if the wait expires
    /// with the queue still empty.
    pub async fn next_event(&self, channel: &str, timeout: Duration) -> ProgressEvent {
        let queue = self.channel(channel);
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = queue.pop() {
                return event;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ProgressEvent::heartbeat();
            }

            // A publish between pop and notified() still wakes us: Notify
            // stores the permit.
            let _ = tokio::time::timeout(remaining, queue.notify.notified()).await;
        }
    }

    /// Take the next event with the default 30s poll timeout.
    pub async fn next_event_default(&self, channel: &str) -> ProgressEvent {
        self.next_event(channel, DEFAULT_POLL_TIMEOUT).await
    }

    /// Whether a channel currently exists.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .expect("bus registry poisoned")
            .contains_key(channel)
    }

    /// Number of events dropped on `channel` due to a full queue.
    pub fn dropped_events(&self, channel: &str) -> u64 {
        let map = self.channels.lock().expect("bus registry poisoned");
        map.get(channel).map(|q| q.dropped()).unwrap_or(0)
    }

    /// Remove a channel and discard its unread events.
    pub fn remove_channel(&self, channel: &str) {
        let mut map = self.channels.lock().expect("bus registry poisoned");
        if map.remove(channel).is_some() {
            debug!(channel, "removed channel");
        }
    }

    /// Evict channels that have been idle past the configured cutoff.
    ///
    /// Returns the number of channels evicted.
    pub fn evict_stale(&self) -> usize {
        let mut map = self.channels.lock().expect("bus registry poisoned");
        let before = map.len();
        map.retain(|name, queue| {
            let stale = queue.idle_for() > self.max_idle;
            if stale {
                warn!(channel = name.as_str(), "evicting stale channel");
            }
            !stale
        });
        before - map.len()
    }

    /// Drop every channel.
    pub fn shutdown_all(&self) {
        let mut map = self.channels.lock().expect("bus registry poisoned");
        let count = map.len();
        map.clear();
        debug!(count, "event bus shut down");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
