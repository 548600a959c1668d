//! Event bridge: forwards [`LifecycleEvent`]s from the notification bus to
//! the [`BroadcastManager`].

use std::sync::Arc;

use pairline_core::LifecycleEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::broadcast::BroadcastManager;

/// Bridges bus events to WebSocket clients.
pub struct EventBridge {
    rx: broadcast::Receiver<LifecycleEvent>,
    broadcast: Arc<BroadcastManager>,
}

impl EventBridge {
    /// Create a bridge from a bus subscription.
    pub fn new(rx: broadcast::Receiver<LifecycleEvent>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { rx, broadcast }
    }

    /// Run until `cancel` fires or the bus closes.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("event bridge cancelled");
                    break;
                }
                received = self.rx.recv() => received,
            };
            match received {
                Ok(event) => {
                    let delivered = self.broadcast.broadcast(&event).await;
                    tracing::debug!(
                        event_type = event.event_type(),
                        session_id = %event.session_id(),
                        delivered,
                        "bridged event to clients"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event bridge: bus closed, exiting");
                    break;
                }
            }
        }
    }
}
