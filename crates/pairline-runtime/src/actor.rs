//! Per-session actor.
//!
//! Each session gets one task that owns its [`SessionRecord`] and its
//! messaging client. Commands from handles and events from the client are
//! consumed by a single `select!` loop, so two transitions for the same id
//! never interleave. Client initialization is polled by the same loop and
//! does not block event or command processing.

use std::sync::Arc;

use metrics::counter;
use pairline_client::{
    AuthStore, ClientEvent, MessagingClient, PairingEncoder, SpawnedClient,
};
use pairline_core::{LifecycleEvent, SessionError, SessionId, SessionState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter;
use crate::bus::NotificationBus;
use crate::errors::TransitionError;
use crate::handle::SessionHandle;
use crate::record::{SessionRecord, SessionView, Trigger};

type Reply = oneshot::Sender<Result<(), SessionError>>;

/// Commands accepted by a session actor.
pub(crate) enum SessionCommand {
    SendMessage {
        address: String,
        body: String,
        reply: Reply,
    },
    Logout {
        reply: Reply,
    },
    Shutdown {
        reply: Reply,
    },
}

/// Everything needed to start an actor.
pub(crate) struct ActorConfig {
    pub record: SessionRecord,
    pub spawned: SpawnedClient,
    pub encoder: Arc<dyn PairingEncoder>,
    pub auth_store: AuthStore,
    pub bus: NotificationBus,
    pub command_buffer: usize,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct SessionActor {
    record: SessionRecord,
    client: Arc<dyn MessagingClient>,
    events: Option<mpsc::Receiver<ClientEvent>>,
    commands: mpsc::Receiver<SessionCommand>,
    view_tx: watch::Sender<SessionView>,
    encoder: Arc<dyn PairingEncoder>,
    auth_store: AuthStore,
    bus: NotificationBus,
    client_destroyed: bool,
}

impl SessionActor {
    /// Spawn the actor task. Returns a handle and the task's join handle.
    pub(crate) fn spawn(config: ActorConfig) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let (view_tx, view_rx) = watch::channel(config.record.view());
        let id = config.record.id().clone();
        let SpawnedClient { client, events } = config.spawned;

        let actor = Self {
            record: config.record,
            client,
            events: Some(events),
            commands: rx,
            view_tx,
            encoder: config.encoder,
            auth_store: config.auth_store,
            bus: config.bus,
            client_destroyed: false,
        };

        let join = tokio::spawn(actor.run());
        (SessionHandle::new(id, tx, view_rx), join)
    }

    async fn run(mut self) {
        let session_id = self.record.id().clone();
        debug!(%session_id, "session actor started");

        let client = Arc::clone(&self.client);
        let init = async move { client.initialize().await };
        tokio::pin!(init);
        let mut initializing = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!(%session_id, "all handles dropped");
                        break;
                    };
                    if let Flow::Stop = self.handle_command(command).await {
                        break;
                    }
                }

                event = next_event(&mut self.events), if self.events.is_some() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            debug!(%session_id, "client event channel closed");
                            self.events = None;
                        }
                    }
                }

                result = &mut init, if initializing => {
                    initializing = false;
                    match result {
                        Ok(()) => debug!(%session_id, "client initialized"),
                        Err(e) => warn!(%session_id, error = %e, "client initialization failed"),
                    }
                }
            }
        }

        debug!(%session_id, state = %self.record.state(), "session actor stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::SendMessage {
                address,
                body,
                reply,
            } => {
                let result = self.send_message(&address, &body).await;
                let _ = reply.send(result);
                Flow::Continue
            }
            SessionCommand::Logout { reply } => {
                let result = self.logout().await;
                let done = result.is_ok();
                let _ = reply.send(result);
                if done { Flow::Stop } else { Flow::Continue }
            }
            SessionCommand::Shutdown { reply } => {
                self.release().await;
                let _ = reply.send(Ok(()));
                Flow::Stop
            }
        }
    }

    async fn handle_event(&mut self, event: ClientEvent) {
        let event_type = event.kind();
        let trigger = match adapter::to_trigger(event, self.encoder.as_ref()).await {
            Ok(trigger) => trigger,
            Err(e) => {
                warn!(session_id = %self.record.id(), event_type, error = %e, "failed to adapt client event");
                return;
            }
        };

        match self.transition(trigger) {
            Ok(Some(event)) => {
                let receivers = self.bus.publish(event);
                debug!(session_id = %self.record.id(), event_type, receivers, "lifecycle event published");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(session_id = %self.record.id(), event_type, error = %e, "ignoring client event");
            }
        }
    }

    fn transition(&mut self, trigger: Trigger) -> Result<Option<LifecycleEvent>, TransitionError> {
        let from = self.record.state();
        let event = self.record.apply(trigger)?;
        let to = self.record.state();
        let _ = self.view_tx.send_replace(self.record.view());
        counter!("session_transitions_total", "to" => to.as_str()).increment(1);
        info!(session_id = %self.record.id(), %from, %to, "session transition");
        Ok(event)
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), SessionError> {
        let session_id = self.record.id();
        let state = self.record.state();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady {
                session_id: session_id.clone(),
                state,
            });
        }

        match self.client.send_message(address, body).await {
            Ok(()) => {
                counter!("messages_sent_total", "outcome" => "sent").increment(1);
                info!(%session_id, address, "message sent");
                Ok(())
            }
            Err(e) => {
                counter!("messages_sent_total", "outcome" => "failed").increment(1);
                warn!(%session_id, address, error = %e, "message send failed");
                Err(SessionError::Client {
                    session_id: session_id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Client logout, client destroy, auth-store purge, then `LoggedOut`.
    ///
    /// Any failing step leaves the record in place so the call can be retried.
    async fn logout(&mut self) -> Result<(), SessionError> {
        let session_id = self.record.id().clone();

        if !self.client_destroyed {
            if let Err(e) = self.client.logout().await {
                warn!(%session_id, error = %e, "client logout failed");
                return Err(teardown(&session_id, format!("client logout failed: {e}")));
            }
            if let Err(e) = self.client.destroy().await {
                warn!(%session_id, error = %e, "client destroy failed");
                return Err(teardown(&session_id, format!("client destroy failed: {e}")));
            }
            self.client_destroyed = true;
        }

        if let Err(e) = self.auth_store.purge(self.record.auth_location()).await {
            warn!(%session_id, error = %e, "auth store purge failed");
            return Err(teardown(&session_id, format!("auth store purge failed: {e}")));
        }

        let _ = self
            .transition(Trigger::Logout)
            .map_err(|e| teardown(&session_id, e.to_string()))?;
        Ok(())
    }

    /// Destroy the client without logging out. Used at process shutdown.
    async fn release(&mut self) {
        if self.client_destroyed {
            return;
        }
        if let Err(e) = self.client.destroy().await {
            warn!(session_id = %self.record.id(), error = %e, "client destroy failed during shutdown");
        }
        self.client_destroyed = true;
    }
}

fn teardown(session_id: &SessionId, message: String) -> SessionError {
    SessionError::Teardown {
        session_id: session_id.clone(),
        message,
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<ClientEvent>>) -> Option<ClientEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
