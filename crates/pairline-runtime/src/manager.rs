//! Session lifecycle manager.
//!
//! Entry point for the gateway. Validates requests, resolves ids through the
//! [`SessionRegistry`], and forwards mutations to the owning session actor.
//! Reads are served from the actor's published [`SessionView`] and never wait
//! on an in-flight operation.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use pairline_client::{AuthStore, ClientFactory, DataUrlEncoder, PairingEncoder};
use pairline_core::{LifecycleEvent, SessionError, SessionId, SessionState, normalize_address};
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument, warn};

use crate::actor::{ActorConfig, SessionActor};
use crate::bus::NotificationBus;
use crate::handle::SessionHandle;
use crate::record::{SessionRecord, SessionView};
use crate::registry::SessionRegistry;

/// Tunables for [`SessionManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Capacity of each actor's command queue.
    pub command_buffer: usize,
    /// How long [`SessionManager::shutdown`] waits for clients to be destroyed.
    pub shutdown_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Owns the registry and spawns one actor per session.
pub struct SessionManager {
    registry: SessionRegistry,
    factory: Arc<dyn ClientFactory>,
    encoder: Arc<dyn PairingEncoder>,
    auth_store: AuthStore,
    bus: NotificationBus,
    config: ManagerConfig,
}

impl SessionManager {
    /// Create a manager with an empty registry and the data-URL encoder.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        auth_store: AuthStore,
        bus: NotificationBus,
        config: ManagerConfig,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            factory,
            encoder: Arc::new(DataUrlEncoder),
            auth_store,
            bus,
            config,
        }
    }

    /// Replace the pairing-code encoder.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Arc<dyn PairingEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Allocate an id, spawn its client and actor, and register it.
    ///
    /// The new session starts in `Created`; client initialization proceeds in
    /// the background.
    #[instrument(skip(self))]
    pub async fn start_session(&self) -> Result<SessionView, SessionError> {
        let session_id = SessionId::new();
        let auth_location = self.auth_store.location(&session_id);

        let spawned = self
            .factory
            .spawn(&session_id, &auth_location)
            .await
            .map_err(|e| SessionError::Client {
                session_id: session_id.clone(),
                message: e.to_string(),
            })?;

        let (handle, _join) = SessionActor::spawn(ActorConfig {
            record: SessionRecord::new(session_id.clone(), auth_location),
            spawned,
            encoder: Arc::clone(&self.encoder),
            auth_store: self.auth_store.clone(),
            bus: self.bus.clone(),
            command_buffer: self.config.command_buffer,
        });

        if let Err(e) = self.registry.create(handle.clone()) {
            let _ = handle.shutdown().await;
            return Err(e.into());
        }

        counter!("sessions_started_total").increment(1);
        gauge!("sessions_active").increment(1.0);
        info!(%session_id, "session started");
        Ok(handle.view())
    }

    /// Current snapshot of a session.
    pub fn get(&self, id: &str) -> Result<SessionView, SessionError> {
        let view = self.registry.get(id)?.view();
        if view.state == SessionState::LoggedOut {
            return Err(SessionError::NotFound(view.id));
        }
        Ok(view)
    }

    /// Snapshots of every live session, oldest first.
    pub fn list(&self) -> Vec<SessionView> {
        self.registry
            .list()
            .iter()
            .map(SessionHandle::view)
            .filter(|v| v.state != SessionState::LoggedOut)
            .collect()
    }

    /// Receiver notified after every transition of one session.
    pub fn watch(&self, id: &str) -> Result<watch::Receiver<SessionView>, SessionError> {
        Ok(self.registry.get(id)?.watch())
    }

    /// Send a message from a ready session.
    ///
    /// Checked in order: session exists, both fields present, destination has
    /// digits, session is ready. The client is only invoked when all pass.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn send_message(
        &self,
        id: &str,
        number: &str,
        message: &str,
    ) -> Result<(), SessionError> {
        let handle = self.registry.get(id)?;

        if number.trim().is_empty() || message.trim().is_empty() {
            return Err(SessionError::invalid_input("number and message are required"));
        }
        let address = normalize_address(number)?;

        let state = handle.state();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady {
                session_id: handle.id().clone(),
                state,
            });
        }

        handle.send_message(address, message.to_string()).await
    }

    /// Log out and tear down a session.
    ///
    /// The registry entry is deleted only after the actor reports a completed
    /// teardown. On failure the session stays registered and the call can be
    /// retried.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn logout(&self, id: &str) -> Result<(), SessionError> {
        let handle = self.registry.get(id)?;
        handle.logout().await?;

        if self.registry.delete(id).is_ok() {
            gauge!("sessions_active").decrement(1.0);
        }
        info!(session_id = %id, "session logged out");
        Ok(())
    }

    /// Receive lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.bus.subscribe()
    }

    /// The notification bus.
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Number of registered sessions.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Destroy every client (no logout, auth stores kept) and stop all actors.
    ///
    /// Waits at most the configured shutdown timeout.
    pub async fn shutdown(&self) {
        let handles = self.registry.list();
        if handles.is_empty() {
            return;
        }
        info!(sessions = handles.len(), "shutting down sessions");

        let all = futures::future::join_all(handles.iter().map(SessionHandle::shutdown));
        if tokio::time::timeout(self.config.shutdown_timeout, all)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "session shutdown timed out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mockall::mock;
    use pairline_client::testing::{FakeCall, FakeClientFactory};
    use pairline_client::{ClientError, ClientEvent, MessagingClient, SpawnedClient};
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Harness {
        manager: SessionManager,
        factory: FakeClientFactory,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeClientFactory::new();
        let manager = SessionManager::new(
            Arc::new(factory.clone()),
            AuthStore::new(dir.path()),
            NotificationBus::new(),
            ManagerConfig::default(),
        );
        Harness {
            manager,
            factory,
            _dir: dir,
        }
    }

    async fn wait_for(manager: &SessionManager, id: &SessionId, state: SessionState) -> SessionView {
        let mut rx = manager.watch(id).unwrap();
        let view = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|v| v.state == state),
        )
        .await
        .expect("timed out waiting for state")
        .unwrap()
        .clone();
        view
    }

    async fn wait_for_call(factory: &FakeClientFactory, id: &SessionId, call: FakeCall) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !factory.calls(id).contains(&call) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for call");
    }

    async fn ready_session(h: &Harness) -> SessionId {
        let id = h.manager.start_session().await.unwrap().id;
        wait_for_call(&h.factory, &id, FakeCall::Initialize).await;
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("X123".into())).await);
        assert!(h.factory.emit(&id, ClientEvent::Authenticated).await);
        assert!(h.factory.emit(&id, ClientEvent::Ready).await);
        let _ = wait_for(&h.manager, &id, SessionState::Ready).await;
        id
    }

    #[tokio::test]
    async fn get_after_start_is_created() {
        let h = harness();
        let view = h.manager.start_session().await.unwrap();
        assert_eq!(view.state, SessionState::Created);
        assert!(view.qr_payload.is_none());

        let fetched = h.manager.get(&view.id).unwrap();
        assert_eq!(fetched.id, view.id);
        assert_eq!(h.manager.active_count(), 1);
        assert_eq!(h.factory.spawned(), vec![view.id]);
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let h = harness();
        let a = h.manager.start_session().await.unwrap().id;
        let b = h.manager.start_session().await.unwrap().id;
        assert_ne!(a, b);
        assert_eq!(h.manager.list().len(), 2);
    }

    #[tokio::test]
    async fn spawn_failure_registers_nothing() {
        let h = harness();
        h.factory.fail_spawn();
        assert_matches!(h.manager.start_session().await, Err(SessionError::Client { .. }));
        assert_eq!(h.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn pairing_flow_publishes_events() {
        let h = harness();
        let mut events = h.manager.subscribe();
        let id = h.manager.start_session().await.unwrap().id;

        assert!(h.factory.emit(&id, ClientEvent::PairingCode("X123".into())).await);
        let view = wait_for(&h.manager, &id, SessionState::AwaitingScan).await;
        assert_eq!(view.qr_payload.as_deref(), Some("data:text/plain;base64,WDEyMw=="));

        let event = events.recv().await.unwrap();
        assert_matches!(event, LifecycleEvent::Qr { ref session_id, .. } if *session_id == id);

        assert!(h.factory.emit(&id, ClientEvent::Authenticated).await);
        assert!(h.factory.emit(&id, ClientEvent::Ready).await);
        let view = wait_for(&h.manager, &id, SessionState::Ready).await;
        assert!(view.qr_payload.is_none());

        assert_eq!(events.recv().await.unwrap().event_type(), "authenticated");
        assert_eq!(events.recv().await.unwrap().event_type(), "ready");
    }

    #[tokio::test]
    async fn rotating_codes_keep_latest() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        let mut rx = h.manager.watch(&id).unwrap();

        assert!(h.factory.emit(&id, ClientEvent::PairingCode("A".into())).await);
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("B".into())).await);

        let expected = "data:text/plain;base64,Qg==";
        let view = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|v| v.qr_payload.as_deref() == Some(expected)),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(view.state, SessionState::AwaitingScan);
    }

    #[tokio::test]
    async fn undecodable_code_does_not_advance() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;

        assert!(h.factory.emit(&id, ClientEvent::PairingCode(String::new())).await);
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("ok".into())).await);
        let view = wait_for(&h.manager, &id, SessionState::AwaitingScan).await;
        assert!(view.qr_payload.is_some());
    }

    #[tokio::test]
    async fn events_flow_while_initialize_is_pending() {
        let h = harness();
        h.factory.hang_initialize();
        let id = h.manager.start_session().await.unwrap().id;

        assert!(h.factory.emit(&id, ClientEvent::PairingCode("X".into())).await);
        let _ = wait_for(&h.manager, &id, SessionState::AwaitingScan).await;
    }

    #[tokio::test]
    async fn initialize_failure_leaves_session_created() {
        let h = harness();
        h.factory.fail_initialize("browser crashed");
        let id = h.manager.start_session().await.unwrap().id;
        wait_for_call(&h.factory, &id, FakeCall::Initialize).await;
        assert_eq!(h.manager.get(&id).unwrap().state, SessionState::Created);
    }

    #[tokio::test]
    async fn send_message_normalizes_address() {
        let h = harness();
        let id = ready_session(&h).await;

        h.manager.send_message(&id, "+62 812-3456", "hi").await.unwrap();
        assert!(h.factory.calls(&id).contains(&FakeCall::SendMessage {
            address: "628123456@c.us".into(),
            body: "hi".into(),
        }));
    }

    #[tokio::test]
    async fn send_message_error_order() {
        let h = harness();
        assert_matches!(
            h.manager.send_message("missing", "", "").await,
            Err(SessionError::NotFound(_))
        );

        let id = h.manager.start_session().await.unwrap().id;
        assert_matches!(
            h.manager.send_message(&id, "", "hi").await,
            Err(SessionError::InvalidInput(_))
        );
        assert_matches!(
            h.manager.send_message(&id, "123", "  ").await,
            Err(SessionError::InvalidInput(_))
        );
        assert_matches!(
            h.manager.send_message(&id, "abc", "hi").await,
            Err(SessionError::InvalidInput(_))
        );
        assert_matches!(
            h.manager.send_message(&id, "123", "hi").await,
            Err(SessionError::NotReady { state: SessionState::Created, .. })
        );
        assert!(
            !h.factory
                .calls(&id)
                .iter()
                .any(|c| matches!(c, FakeCall::SendMessage { .. }))
        );
    }

    #[tokio::test]
    async fn send_failure_keeps_state() {
        let h = harness();
        let id = ready_session(&h).await;
        h.factory.fail_send("network down");

        assert_matches!(
            h.manager.send_message(&id, "123", "hi").await,
            Err(SessionError::Client { message, .. }) if message.contains("network down")
        );
        assert_eq!(h.manager.get(&id).unwrap().state, SessionState::Ready);
    }

    #[tokio::test]
    async fn disconnect_after_ready() {
        let h = harness();
        let id = ready_session(&h).await;
        assert!(h.factory.emit(&id, ClientEvent::Disconnected("NAVIGATION".into())).await);
        let _ = wait_for(&h.manager, &id, SessionState::Disconnected).await;
        assert_matches!(
            h.manager.send_message(&id, "1", "hi").await,
            Err(SessionError::NotReady { state: SessionState::Disconnected, .. })
        );
    }

    #[tokio::test]
    async fn logout_unknown_is_not_found() {
        let h = harness();
        assert_matches!(h.manager.logout("nope").await, Err(SessionError::NotFound(_)));
        assert!(h.factory.spawned().is_empty());
    }

    #[tokio::test]
    async fn logout_tears_down_and_removes() {
        let h = harness();
        let id = ready_session(&h).await;
        let location = h.factory.auth_location(&id).unwrap();
        assert!(location.exists());

        h.manager.logout(&id).await.unwrap();

        assert_matches!(h.manager.get(&id), Err(SessionError::NotFound(_)));
        assert!(!location.exists());
        assert_eq!(h.manager.active_count(), 0);
        let calls = h.factory.calls(&id);
        assert!(calls.contains(&FakeCall::Logout));
        assert!(calls.contains(&FakeCall::Destroy));

        assert_matches!(h.manager.logout(&id).await, Err(SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn logout_from_failed_state() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("A".into())).await);
        assert!(h.factory.emit(&id, ClientEvent::AuthFailure("rejected".into())).await);
        let _ = wait_for(&h.manager, &id, SessionState::Failed).await;

        h.manager.logout(&id).await.unwrap();
        assert_matches!(h.manager.get(&id), Err(SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn logout_failure_when_paired_keeps_record() {
        let h = harness();
        let id = ready_session(&h).await;
        h.factory.fail_logout("remote refused");

        let err = h.manager.logout(&id).await.unwrap_err();
        assert_matches!(&err, SessionError::Teardown { .. });
        assert!(err.is_retryable());
        assert_eq!(h.manager.get(&id).unwrap().state, SessionState::Ready);

        h.factory.clear_failures();
        h.manager.logout(&id).await.unwrap();
        assert_matches!(h.manager.get(&id), Err(SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn logout_failure_before_pairing_keeps_record() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        wait_for_call(&h.factory, &id, FakeCall::Initialize).await;
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("A".into())).await);
        let _ = wait_for(&h.manager, &id, SessionState::AwaitingScan).await;
        let location = h.factory.auth_location(&id).unwrap();
        h.factory.fail_logout("client threw");

        assert_matches!(h.manager.logout(&id).await, Err(SessionError::Teardown { .. }));
        assert_eq!(h.manager.get(&id).unwrap().state, SessionState::AwaitingScan);
        assert!(location.exists());
        assert!(!h.factory.calls(&id).contains(&FakeCall::Destroy));

        h.factory.clear_failures();
        h.manager.logout(&id).await.unwrap();
        assert_matches!(h.manager.get(&id), Err(SessionError::NotFound(_)));
        assert!(!location.exists());
    }

    #[tokio::test]
    async fn logout_racing_late_ready_ends_logged_out() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        wait_for_call(&h.factory, &id, FakeCall::Initialize).await;
        assert!(h.factory.emit(&id, ClientEvent::PairingCode("A".into())).await);
        assert!(h.factory.emit(&id, ClientEvent::Authenticated).await);
        let _ = wait_for(&h.manager, &id, SessionState::Authenticated).await;

        let location = h.factory.auth_location(&id).unwrap();
        let view = h.manager.watch(&id).unwrap();
        let mut events = h.manager.subscribe();

        // ready is queued on the event channel while logout is queued on the command channel
        let (_, result) = tokio::join!(
            h.factory.emit(&id, ClientEvent::Ready),
            h.manager.logout(&id)
        );
        result.unwrap();

        assert_matches!(h.manager.get(&id), Err(SessionError::NotFound(_)));
        assert!(!location.exists());
        tokio::time::sleep(Duration::from_millis(50)).await;
        // nothing moved the record out of LoggedOut
        assert_eq!(view.borrow().state, SessionState::LoggedOut);

        let mut published = Vec::new();
        while let Ok(event) = events.try_recv() {
            published.push(event.event_type());
        }
        assert!(published.iter().all(|t| *t == "ready"));
        assert!(published.len() <= 1);
    }

    #[tokio::test]
    async fn destroy_failure_is_teardown_error() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        h.factory.fail_destroy("stuck");

        assert_matches!(h.manager.logout(&id).await, Err(SessionError::Teardown { .. }));
        assert!(h.manager.get(&id).is_ok());

        h.factory.clear_failures();
        h.manager.logout(&id).await.unwrap();
    }

    #[tokio::test]
    async fn purge_failure_retry_skips_client_calls() {
        let h = harness();
        let id = h.manager.start_session().await.unwrap().id;
        wait_for_call(&h.factory, &id, FakeCall::Initialize).await;

        // a plain file where the store directory should be makes the purge fail
        let location = h.factory.auth_location(&id).unwrap();
        std::fs::remove_dir_all(&location).unwrap();
        std::fs::write(&location, "not a directory").unwrap();

        assert_matches!(h.manager.logout(&id).await, Err(SessionError::Teardown { .. }));
        assert!(h.manager.get(&id).is_ok());

        std::fs::remove_file(&location).unwrap();
        h.manager.logout(&id).await.unwrap();

        let calls = h.factory.calls(&id);
        assert_eq!(calls.iter().filter(|c| **c == FakeCall::Logout).count(), 1);
        assert_eq!(calls.iter().filter(|c| **c == FakeCall::Destroy).count(), 1);
    }

    #[tokio::test]
    async fn concurrent_logouts_complete_once() {
        let h = harness();
        let id = ready_session(&h).await;
        let manager = Arc::new(h.manager);

        let a = {
            let m = Arc::clone(&manager);
            let id = id.clone();
            tokio::spawn(async move { m.logout(&id).await })
        };
        let b = {
            let m = Arc::clone(&manager);
            let id = id.clone();
            tokio::spawn(async move { m.logout(&id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(SessionError::NotFound(_))))
        );
        let logouts = h
            .factory
            .calls(&id)
            .iter()
            .filter(|c| **c == FakeCall::Logout)
            .count();
        assert_eq!(logouts, 1);
    }

    #[tokio::test]
    async fn shutdown_destroys_without_purging() {
        let h = harness();
        let id = ready_session(&h).await;
        let location = h.factory.auth_location(&id).unwrap();

        h.manager.shutdown().await;

        let calls = h.factory.calls(&id);
        assert!(calls.contains(&FakeCall::Destroy));
        assert!(!calls.contains(&FakeCall::Logout));
        assert!(location.exists());
        assert_matches!(
            h.manager.send_message(&id, "1", "hi").await,
            Err(SessionError::Unavailable(_))
        );
    }

    mock! {
        Client {}

        #[async_trait]
        impl MessagingClient for Client {
            async fn initialize(&self) -> Result<(), ClientError>;
            async fn send_message(&self, address: &str, body: &str) -> Result<(), ClientError>;
            async fn logout(&self) -> Result<(), ClientError>;
            async fn destroy(&self) -> Result<(), ClientError>;
        }
    }

    struct MockFactory {
        events: parking_lot::Mutex<Option<mpsc::Sender<ClientEvent>>>,
    }

    #[async_trait]
    impl ClientFactory for MockFactory {
        async fn spawn(
            &self,
            _session_id: &SessionId,
            _auth_location: &Path,
        ) -> Result<SpawnedClient, ClientError> {
            let mut client = MockClient::new();
            client.expect_initialize().returning(|| Ok(()));
            client.expect_send_message().never();
            client.expect_destroy().returning(|| Ok(()));
            let (tx, rx) = mpsc::channel(8);
            *self.events.lock() = Some(tx);
            Ok(SpawnedClient {
                client: Arc::new(client),
                events: rx,
            })
        }
    }

    #[tokio::test]
    async fn not_ready_never_reaches_client() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockFactory {
            events: parking_lot::Mutex::new(None),
        });
        let manager = SessionManager::new(
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            AuthStore::new(dir.path()),
            NotificationBus::new(),
            ManagerConfig::default(),
        );
        let id = manager.start_session().await.unwrap().id;

        let events = factory.events.lock().clone().unwrap();
        events.send(ClientEvent::PairingCode("X".into())).await.unwrap();
        events.send(ClientEvent::Authenticated).await.unwrap();
        let _ = wait_for(&manager, &id, SessionState::Authenticated).await;

        assert_matches!(
            manager.send_message(&id, "123", "hi").await,
            Err(SessionError::NotReady { state: SessionState::Authenticated, .. })
        );
        manager.shutdown().await;
    }
}
