//! Lifecycle events published on the notification bus.
//!
//! Wire format (one JSON object per event, internally tagged):
//! ```json
//! { "type": "qr", "sessionId": "0190...", "qrCodeData": "data:..." }
//! { "type": "auth_failure", "sessionId": "0190...", "message": "..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// A lifecycle transition side effect, fanned out to push subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LifecycleEvent {
    /// A (new) pairing code is available.
    Qr {
        /// Session the code belongs to.
        session_id: SessionId,
        /// Encoded pairing payload, ready for display.
        qr_code_data: String,
    },
    /// The remote account accepted the pairing.
    Authenticated {
        /// Session that authenticated.
        session_id: SessionId,
    },
    /// The session can send messages.
    Ready {
        /// Session that became ready.
        session_id: SessionId,
    },
    /// Authentication was rejected.
    AuthFailure {
        /// Session that failed.
        session_id: SessionId,
        /// Reason reported by the client.
        message: String,
    },
    /// The client lost its connection.
    Disconnected {
        /// Session that disconnected.
        session_id: SessionId,
        /// Reason reported by the client.
        reason: String,
    },
}

impl LifecycleEvent {
    /// Wire name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Authenticated { .. } => "authenticated",
            Self::Ready { .. } => "ready",
            Self::AuthFailure { .. } => "auth_failure",
            Self::Disconnected { .. } => "disconnected",
        }
    }

    /// Session the event concerns.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Qr { session_id, .. }
            | Self::Authenticated { session_id }
            | Self::Ready { session_id }
            | Self::AuthFailure { session_id, .. }
            | Self::Disconnected { session_id, .. } => session_id,
        }
    }
}
