//! Session record and its state machine.
//!
//! | From | Trigger | To |
//! |---|---|---|
//! | Created, AwaitingScan | pairing code | AwaitingScan (payload replaced) |
//! | AwaitingScan | authenticated | Authenticated |
//! | Authenticated | ready | Ready |
//! | AwaitingScan, Authenticated | auth failure | Failed |
//! | Ready | disconnected | Disconnected |
//! | any non-terminal | logout | LoggedOut |
//!
//! Anything else is a [`TransitionError`] and leaves the record untouched.
//! The QR payload is present exactly while the state is `AwaitingScan`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pairline_core::{LifecycleEvent, SessionId, SessionState};
use serde::Serialize;

use crate::errors::TransitionError;

/// Input to [`SessionRecord::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// A pairing code was raised and encoded into a displayable payload.
    PairingCode(String),
    /// The client authenticated.
    Authenticated,
    /// The client became ready.
    Ready,
    /// Authentication was rejected.
    AuthFailure(String),
    /// Connection lost.
    Disconnected(String),
    /// Explicit logout completed its teardown.
    Logout,
}

impl Trigger {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PairingCode(_) => "pairing_code",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailure(_) => "auth_failure",
            Self::Disconnected(_) => "disconnected",
            Self::Logout => "logout",
        }
    }
}

/// One session's lifecycle state. Owned by that session's actor.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    id: SessionId,
    state: SessionState,
    qr_payload: Option<String>,
    auth_location: PathBuf,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// New record in `Created`.
    pub fn new(id: SessionId, auth_location: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Created,
            qr_payload: None,
            auth_location,
            created_at: now,
            updated_at: now,
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current QR payload, only while awaiting a scan.
    pub fn qr_payload(&self) -> Option<&str> {
        self.qr_payload.as_deref()
    }

    /// Credential store location for this session.
    pub fn auth_location(&self) -> &Path {
        &self.auth_location
    }

    /// Apply a trigger. On success returns the event to broadcast, if any.
    pub fn apply(&mut self, trigger: Trigger) -> Result<Option<LifecycleEvent>, TransitionError> {
        use SessionState as S;

        let reject = |from: SessionState, trigger: &Trigger| TransitionError {
            from,
            trigger: trigger.name(),
        };
        let id = self.id.clone();

        let (next, qr, event) = match (self.state, trigger) {
            (S::Created | S::AwaitingScan, Trigger::PairingCode(payload)) if !payload.is_empty() => {
                let event = LifecycleEvent::Qr {
                    session_id: id,
                    qr_code_data: payload.clone(),
                };
                (S::AwaitingScan, Some(payload), Some(event))
            }
            (S::AwaitingScan, Trigger::Authenticated) => (
                S::Authenticated,
                None,
                Some(LifecycleEvent::Authenticated { session_id: id }),
            ),
            (S::Authenticated, Trigger::Ready) => {
                (S::Ready, None, Some(LifecycleEvent::Ready { session_id: id }))
            }
            (S::AwaitingScan | S::Authenticated, Trigger::AuthFailure(message)) => (
                S::Failed,
                None,
                Some(LifecycleEvent::AuthFailure {
                    session_id: id,
                    message,
                }),
            ),
            (S::Ready, Trigger::Disconnected(reason)) => (
                S::Disconnected,
                None,
                Some(LifecycleEvent::Disconnected {
                    session_id: id,
                    reason,
                }),
            ),
            (from, Trigger::Logout) if from.accepts_logout() => (S::LoggedOut, None, None),
            (from, trigger) => return Err(reject(from, &trigger)),
        };

        self.state = next;
        self.qr_payload = qr;
        self.updated_at = Utc::now();
        Ok(event)
    }

    /// Snapshot for readers outside the actor.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            state: self.state,
            qr_payload: self.qr_payload.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Immutable snapshot of a session, published after every transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session id.
    pub id: SessionId,
    /// State at snapshot time.
    pub state: SessionState,
    /// QR payload while awaiting a scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
}
