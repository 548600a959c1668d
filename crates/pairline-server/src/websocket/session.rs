//! WebSocket push session: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pairline_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Grace period for the close frame after shutdown is requested.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-connection tunables.
#[derive(Clone, Copy, Debug)]
pub struct WsSessionConfig {
    /// Outbound queue length.
    pub send_queue: usize,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Disconnect after this long without a pong.
    pub pong_timeout: Duration,
}

/// The first frame sent on every connection.
pub fn established_frame(client_id: &str, session_id: Option<&SessionId>) -> serde_json::Value {
    let mut frame = serde_json::json!({
        "type": "connection.established",
        "clientId": client_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if let Some(sid) = session_id {
        frame["sessionId"] = serde_json::json!(sid.as_str());
    }
    frame
}

/// Run a push session.
///
/// Queues `connection.established`, registers with the broadcast manager,
/// forwards queued events, pings the client, and unregisters on disconnect
/// or shutdown. Inbound text is ignored; the channel is push-only.
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    bind: Option<SessionId>,
    broadcast: Arc<BroadcastManager>,
    config: WsSessionConfig,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));
    if let Some(sid) = &bind {
        connection.bind_session(sid.clone());
    }

    let connection_start = Instant::now();
    info!(session_id = ?bind, "push client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // queued before registering so it is always the first frame
    let _ = connection.send_json(&established_frame(&client_id, bind.as_ref()));
    broadcast.add(Arc::clone(&connection)).await;

    let outbound_conn = Arc::clone(&connection);
    let outbound_cancel = cancel.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(config.ping_interval);
        // skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > config.pong_timeout
                    {
                        warn!("client unresponsive for {:?}, disconnecting", config.pong_timeout);
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                () = outbound_conn.closed() => {
                    debug!("connection closed by server");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut outbound_done = false;
    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) => {
                        debug!("client sent close frame");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => connection.mark_alive(),
                    Some(Ok(Message::Text(text))) => {
                        connection.mark_alive();
                        debug!(len = text.len(), "ignoring inbound text frame");
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(len = data.len(), "ignoring inbound binary frame");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut outbound => {
                outbound_done = true;
                break;
            }
            () = cancel.cancelled() => break,
        }
    }

    let _ = broadcast.remove(&client_id).await;
    if !outbound_done {
        if cancel.is_cancelled() {
            let _ = tokio::time::timeout(CLOSE_GRACE, &mut outbound).await;
        }
        outbound.abort();
    }

    info!("push client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    // Full sessions need a real socket; see tests/integration.rs.
    use super::*;

    #[test]
    fn established_frame_unbound() {
        let frame = established_frame("ws_1", None);
        assert_eq!(frame["type"], "connection.established");
        assert_eq!(frame["clientId"], "ws_1");
        assert!(frame["timestamp"].is_string());
        assert!(frame.get("sessionId").is_none());
    }

    #[test]
    fn established_frame_bound() {
        let sid = SessionId::from("s1");
        let frame = established_frame("ws_2", Some(&sid));
        assert_eq!(frame["sessionId"], "s1");
    }
}
