//! Session lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a session record.
///
/// Initial state is [`SessionState::Created`]; the only terminal state is
/// [`SessionState::LoggedOut`]. `Failed` and `Disconnected` are dead ends
/// that can still be logged out, but never recover on their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Client spawned, no pairing code yet.
    Created,
    /// A pairing code is available and waiting to be scanned.
    AwaitingScan,
    /// The remote account accepted the pairing.
    Authenticated,
    /// Outbound messages may be sent.
    Ready,
    /// Authentication was rejected.
    Failed,
    /// The client lost its connection after becoming ready.
    Disconnected,
    /// Torn down by an explicit logout.
    LoggedOut,
}

impl SessionState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut)
    }

    /// Whether an explicit logout is accepted from this state.
    pub fn accepts_logout(self) -> bool {
        !self.is_terminal()
    }

    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingScan => "awaiting_scan",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
