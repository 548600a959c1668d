//! Messaging-client trait and the typed event channel it feeds.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pairline_core::SessionId;
use tokio::sync::mpsc;

use crate::errors::ClientError;

/// Asynchronous notification raised by a messaging client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A raw pairing code is available (codes rotate until scanned).
    PairingCode(String),
    /// The remote account accepted the pairing.
    Authenticated,
    /// The client can send messages.
    Ready,
    /// Authentication was rejected.
    AuthFailure(String),
    /// The connection to the messaging network was lost.
    Disconnected(String),
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PairingCode(_) => "pairing_code",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailure(_) => "auth_failure",
            Self::Disconnected(_) => "disconnected",
        }
    }
}

/// Commands accepted by a messaging client.
///
/// Every method may fail; errors never panic across this boundary.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start the pairing handshake. Events follow on the event channel.
    async fn initialize(&self) -> Result<(), ClientError>;

    /// Deliver `body` to a normalized chat address.
    async fn send_message(&self, address: &str, body: &str) -> Result<(), ClientError>;

    /// Sign the paired account out of the messaging network.
    async fn logout(&self) -> Result<(), ClientError>;

    /// Release every resource held by the client.
    async fn destroy(&self) -> Result<(), ClientError>;
}

/// A freshly spawned client and the receiving end of its event channel.
pub struct SpawnedClient {
    /// Command handle.
    pub client: Arc<dyn MessagingClient>,
    /// Events raised by this client, in emission order.
    pub events: mpsc::Receiver<ClientEvent>,
}

impl std::fmt::Debug for SpawnedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedClient").finish_non_exhaustive()
    }
}

/// Creates one client per session.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Spawn a client bound to `session_id` that persists credentials at
    /// `auth_location`.
    async fn spawn(
        &self,
        session_id: &SessionId,
        auth_location: &Path,
    ) -> Result<SpawnedClient, ClientError>;
}
