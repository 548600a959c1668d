//! Mapping of session errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pairline_core::SessionError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by gateway handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A lifecycle operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The push channel is at its connection limit.
    #[error("too many push connections (limit {0})")]
    TooManyConnections(usize),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Session(e) => session_status(e),
            Self::TooManyConnections(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Session(e) => e.code(),
            Self::TooManyConnections(_) => "TOO_MANY_CONNECTIONS",
        }
    }
}

/// HTTP status for a session error.
pub fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SessionError::NotReady { .. } | SessionError::AlreadyExists(_) => StatusCode::CONFLICT,
        SessionError::Client { .. } | SessionError::Teardown { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        SessionError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// JSON status body: `{status, message}` plus an error code on failure.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    /// `"success"` or `"error"`.
    pub status: &'static str,
    /// Human-readable outcome.
    pub message: String,
    /// Error code, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Whether repeating the request may succeed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl StatusBody {
    /// Success body.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            code: None,
            retryable: false,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let retryable = matches!(&self, Self::Session(e) if e.is_retryable());
        let body = StatusBody {
            status: "error",
            message: self.to_string(),
            code: Some(self.code()),
            retryable,
        };
        (self.status(), Json(body)).into_response()
    }
}
