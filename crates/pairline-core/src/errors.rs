//! Session error taxonomy.
//!
//! - `NotFound` / `InvalidInput` / `NotReady`: reported to the caller with no
//!   state mutation.
//! - `Client`: the messaging client failed during send or init. Session state
//!   is untouched.
//! - `Teardown`: a logout cleanup step failed. The record is retained so the
//!   operator can retry.

use thiserror::Error;

use crate::ids::SessionId;
use crate::state::SessionState;

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with this identifier exists.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// A request field was missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation requires the session to be ready.
    #[error("session {session_id} is not ready (state: {state})")]
    NotReady {
        /// Session the operation targeted.
        session_id: SessionId,
        /// State at the time of the request.
        state: SessionState,
    },

    /// The underlying messaging client failed.
    #[error("client error for {session_id}: {message}")]
    Client {
        /// Session whose client failed.
        session_id: SessionId,
        /// Error reported by the client.
        message: String,
    },

    /// A logout cleanup step failed; the record was kept.
    #[error("teardown failed for {session_id}: {message}")]
    Teardown {
        /// Session being torn down.
        session_id: SessionId,
        /// What went wrong.
        message: String,
    },

    /// An identifier was inserted twice (or reused after deletion).
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    /// The session worker is gone (process shutting down).
    #[error("session unavailable: {0}")]
    Unavailable(SessionId),
}

impl SessionError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotReady { .. } => "NOT_READY",
            Self::Client { .. } => "CLIENT_ERROR",
            Self::Teardown { .. } => "TEARDOWN_ERROR",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// Whether the operator can usefully retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Teardown { .. })
    }

    /// Shorthand for [`SessionError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
