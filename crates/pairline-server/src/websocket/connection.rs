//! Push-channel client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pairline_core::{LifecycleEvent, SessionId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Session this client follows; `None` follows every session.
    session_id: Mutex<Option<SessionId>>,
    /// Queue drained by the connection's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client answered since the last heartbeat check.
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    // cancelled when the server gives up on this client
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create an unbound connection.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            session_id: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Follow a single session.
    pub fn bind_session(&self, session_id: impl Into<SessionId>) {
        *self.session_id.lock() = Some(session_id.into());
    }

    /// Bound session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.lock().clone()
    }

    /// Whether `event` should be delivered to this client.
    pub fn wants(&self, event: &LifecycleEvent) -> bool {
        self.session_id
            .lock()
            .as_ref()
            .is_none_or(|bound| bound == event.session_id())
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the queue is full or closed, and counts the drop.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a JSON value and queue it.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Ask the connection's write task to close the socket.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Messages dropped over the connection's lifetime.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a pong (or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Read and reset the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong, or since connecting.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (ClientConnection::new("conn_1".into(), tx), rx)
    }

    fn ready(id: &str) -> LifecycleEvent {
        LifecycleEvent::Ready {
            session_id: SessionId::from(id),
        }
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(rx.recv().await.unwrap().as_str(), "hello");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn send_to_closed_channel_counts_drop() {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new("conn_2".into(), tx);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_counts_drop() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new("conn_3".into(), tx);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert!(!conn.send(Arc::new("msg3".into())));
        assert_eq!(conn.drop_count(), 2);
    }

    #[test]
    fn unbound_connection_wants_everything() {
        let (conn, _rx) = make_connection();
        assert!(conn.session_id().is_none());
        assert!(conn.wants(&ready("a")));
        assert!(conn.wants(&ready("b")));
    }

    #[test]
    fn bound_connection_filters_by_session() {
        let (conn, _rx) = make_connection();
        conn.bind_session("a");
        assert_eq!(conn.session_id().as_deref(), Some("a"));
        assert!(conn.wants(&ready("a")));
        assert!(!conn.wants(&ready("b")));
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send_json(&serde_json::json!({"type": "connection.established"})));
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "connection.established");
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.last_pong_elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let (conn, _rx) = make_connection();
        assert!(!conn.is_closed());
        conn.close();
        assert!(conn.is_closed());
        tokio::time::timeout(Duration::from_secs(1), conn.closed())
            .await
            .unwrap();
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.age() > age1);
    }
}
