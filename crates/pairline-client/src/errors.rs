//! Messaging-client errors.

use thiserror::Error;

/// Errors raised by a messaging client or its helpers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client process could not be started.
    #[error("failed to spawn client: {0}")]
    Spawn(#[source] std::io::Error),

    /// Reading from or writing to the client failed.
    #[error("client I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent something we could not understand.
    #[error("client protocol error: {0}")]
    Protocol(String),

    /// The client processed the request and reported a failure.
    #[error("client rejected request: {0}")]
    Rejected(String),

    /// The client went away before answering.
    #[error("client connection closed")]
    Closed,

    /// A pairing code could not be turned into a displayable payload.
    #[error("pairing code encode failed: {0}")]
    Encode(String),
}
