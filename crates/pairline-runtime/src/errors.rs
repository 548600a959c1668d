//! Runtime error types.

use pairline_core::{SessionError, SessionId, SessionState};
use thiserror::Error;

/// A trigger that has no edge from the record's current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transition from {from} on {trigger}")]
pub struct TransitionError {
    /// State the record was in.
    pub from: SessionState,
    /// Trigger that was rejected.
    pub trigger: &'static str,
}

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No entry for this id.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The id is present, or was used by a session that has been deleted.
    #[error("session id already used: {0}")]
    AlreadyExists(SessionId),
}

impl From<RegistryError> for SessionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(id),
            RegistryError::AlreadyExists(id) => Self::AlreadyExists(id),
        }
    }
}
