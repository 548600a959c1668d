//! In-memory messaging client for tests.
//!
//! [`FakeClientFactory`] hands out [`FakeClient`]s that record every call,
//! create their auth directory on `initialize` the way a real client persists
//! credentials, and fail on demand. Tests drive the pairing flow by pushing
//! [`ClientEvent`]s with [`FakeClientFactory::emit`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pairline_core::SessionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::{ClientEvent, ClientFactory, MessagingClient, SpawnedClient};
use crate::errors::ClientError;

/// A call made against a [`FakeClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeCall {
    /// `initialize()`
    Initialize,
    /// `send_message(address, body)`
    SendMessage {
        /// Destination address as received.
        address: String,
        /// Message body.
        body: String,
    },
    /// `logout()`
    Logout,
    /// `destroy()`
    Destroy,
}

/// Which operations should fail, shared by every client of a factory.
#[derive(Clone, Debug, Default)]
struct FailurePlan {
    spawn: bool,
    initialize: Option<String>,
    hang_initialize: bool,
    send: Option<String>,
    logout: Option<String>,
    destroy: Option<String>,
}

#[derive(Debug)]
struct FakeSession {
    events: mpsc::Sender<ClientEvent>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
    auth_location: PathBuf,
}

#[derive(Debug, Default)]
struct Shared {
    sessions: Mutex<HashMap<SessionId, FakeSession>>,
    spawned: Mutex<Vec<SessionId>>,
    failures: Mutex<FailurePlan>,
}

/// Factory producing [`FakeClient`]s. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct FakeClientFactory {
    shared: Arc<Shared>,
}

impl FakeClientFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event to a session's client. Returns `false` if the session
    /// was never spawned or its receiver is gone.
    pub async fn emit(&self, session_id: &SessionId, event: ClientEvent) -> bool {
        let sender = self
            .shared
            .sessions
            .lock()
            .get(session_id)
            .map(|s| s.events.clone());
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Calls recorded for a session, in order.
    pub fn calls(&self, session_id: &SessionId) -> Vec<FakeCall> {
        self.shared
            .sessions
            .lock()
            .get(session_id)
            .map(|s| s.calls.lock().clone())
            .unwrap_or_default()
    }

    /// Sessions spawned so far, in spawn order.
    pub fn spawned(&self) -> Vec<SessionId> {
        self.shared.spawned.lock().clone()
    }

    /// Auth location a session was spawned with.
    pub fn auth_location(&self, session_id: &SessionId) -> Option<PathBuf> {
        self.shared
            .sessions
            .lock()
            .get(session_id)
            .map(|s| s.auth_location.clone())
    }

    /// Make `spawn` fail.
    pub fn fail_spawn(&self) {
        self.shared.failures.lock().spawn = true;
    }

    /// Make `initialize` fail with `message`.
    pub fn fail_initialize(&self, message: &str) {
        self.shared.failures.lock().initialize = Some(message.to_string());
    }

    /// Make `initialize` never complete.
    pub fn hang_initialize(&self) {
        self.shared.failures.lock().hang_initialize = true;
    }

    /// Make `send_message` fail with `message`.
    pub fn fail_send(&self, message: &str) {
        self.shared.failures.lock().send = Some(message.to_string());
    }

    /// Make `logout` fail with `message`.
    pub fn fail_logout(&self, message: &str) {
        self.shared.failures.lock().logout = Some(message.to_string());
    }

    /// Make `destroy` fail with `message`.
    pub fn fail_destroy(&self, message: &str) {
        self.shared.failures.lock().destroy = Some(message.to_string());
    }

    /// Clear every primed failure.
    pub fn clear_failures(&self) {
        *self.shared.failures.lock() = FailurePlan::default();
    }
}

#[async_trait]
impl ClientFactory for FakeClientFactory {
    async fn spawn(
        &self,
        session_id: &SessionId,
        auth_location: &Path,
    ) -> Result<SpawnedClient, ClientError> {
        if self.shared.failures.lock().spawn {
            return Err(ClientError::Spawn(std::io::Error::other("spawn disabled")));
        }

        let (tx, rx) = mpsc::channel(64);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let _ = self.shared.sessions.lock().insert(
            session_id.clone(),
            FakeSession {
                events: tx,
                calls: Arc::clone(&calls),
                auth_location: auth_location.to_path_buf(),
            },
        );
        self.shared.spawned.lock().push(session_id.clone());

        let client = FakeClient {
            shared: Arc::clone(&self.shared),
            calls,
            auth_location: auth_location.to_path_buf(),
        };
        Ok(SpawnedClient {
            client: Arc::new(client),
            events: rx,
        })
    }
}

/// Client handed out by [`FakeClientFactory`].
#[derive(Debug)]
pub struct FakeClient {
    shared: Arc<Shared>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
    auth_location: PathBuf,
}

impl FakeClient {
    fn record(&self, call: FakeCall) {
        self.calls.lock().push(call);
    }

    fn plan(&self) -> FailurePlan {
        self.shared.failures.lock().clone()
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        let plan = self.plan();
        let result = match plan.initialize {
            Some(message) => Err(ClientError::Rejected(message)),
            None => tokio::fs::create_dir_all(&self.auth_location)
                .await
                .map_err(ClientError::from),
        };
        // recorded once the auth directory exists
        self.record(FakeCall::Initialize);
        if plan.hang_initialize {
            std::future::pending::<()>().await;
        }
        result
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), ClientError> {
        self.record(FakeCall::SendMessage {
            address: address.to_string(),
            body: body.to_string(),
        });
        match self.plan().send {
            Some(message) => Err(ClientError::Rejected(message)),
            None => Ok(()),
        }
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.record(FakeCall::Logout);
        match self.plan().logout {
            Some(message) => Err(ClientError::Rejected(message)),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        self.record(FakeCall::Destroy);
        match self.plan().destroy {
            Some(message) => Err(ClientError::Rejected(message)),
            None => Ok(()),
        }
    }
}
