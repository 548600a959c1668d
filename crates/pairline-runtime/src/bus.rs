//! Broadcast-based notification bus for lifecycle events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pairline_core::LifecycleEvent;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of lifecycle events to live subscribers.
///
/// Non-blocking: `publish` never awaits. Slow receivers lag (lose the oldest
/// events) rather than blocking the publisher. Late subscribers only see
/// events published after they subscribed. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct NotificationBus {
    tx: broadcast::Sender<LifecycleEvent>,
    publish_count: Arc<AtomicU64>,
}

impl NotificationBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            publish_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of receivers, 0 when nobody is listening.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        let _ = self.publish_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events published.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
