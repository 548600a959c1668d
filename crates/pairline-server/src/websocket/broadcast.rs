//! Lifecycle event fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use pairline_core::LifecycleEvent;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Lifetime drops after which a slow client is disconnected.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Tracks push connections and delivers events to the ones that want them.
pub struct BroadcastManager {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    // read without taking the lock
    active_count: AtomicUsize,
    // slots held by upgrades and live sessions, bounded by the connection limit
    reserved: AtomicUsize,
}

/// A reserved push-connection slot. Released on drop.
pub struct ConnectionSlot {
    manager: Arc<BroadcastManager>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let _ = self.manager.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            reserved: AtomicUsize::new(0),
        }
    }

    /// Reserve one of `limit` connection slots, or `None` when all are taken.
    pub fn try_reserve(self: &Arc<Self>, limit: usize) -> Option<ConnectionSlot> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| ConnectionSlot {
                manager: Arc::clone(self),
            })
    }

    /// Slots currently reserved.
    pub fn reserved_slots(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID. Returns whether it was present.
    pub async fn remove(&self, connection_id: &str) -> bool {
        let mut conns = self.connections.write().await;
        let removed = conns.remove(connection_id).is_some();
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Whether a connection is still registered.
    pub async fn contains(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }

    /// Deliver `event` to unbound clients and clients bound to its session.
    ///
    /// Returns the number of clients the frame was queued for.
    pub async fn broadcast(&self, event: &LifecycleEvent) -> usize {
        self.broadcast_to(|c| c.wants(event), event).await
    }

    /// Serialize once, fan out to matching clients, evict slow clients.
    async fn broadcast_to(
        &self,
        filter: impl Fn(&ClientConnection) -> bool,
        event: &LifecycleEvent,
    ) -> usize {
        let event_type = event.event_type();
        let session_id = event.session_id();
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type, %session_id, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read().await;
            for conn in conns.values() {
                if !filter(conn) {
                    continue;
                }
                if conn.send(Arc::clone(&json)) {
                    delivered += 1;
                    continue;
                }
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= MAX_TOTAL_DROPS {
                    warn!(conn_id = %conn.id, %session_id, drops, "disconnecting slow client");
                    to_remove.push(conn.id.clone());
                } else {
                    warn!(conn_id = %conn.id, %session_id, total_drops = drops, "failed to queue event (channel full)");
                }
            }
        }
        debug!(event_type, %session_id, delivered, "broadcast event");

        if !to_remove.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &to_remove {
                if let Some(conn) = conns.remove(id) {
                    conn.close();
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
        delivered
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Connections bound to a specific session.
    pub async fn session_connections(&self, session_id: &str) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.session_id().as_deref() == Some(session_id))
            .cloned()
            .collect()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
