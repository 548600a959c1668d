//! Gateway routes.
//!
//! The browser flow (`/`, `/start-session`, `/qr/{id}`, `/send-message/{id}`)
//! answers with HTML and redirects. `/logout/{id}` and `/api/*` answer JSON.

pub mod api;
pub mod pages;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use pairline_core::{SessionError, SessionState};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{GatewayError, StatusBody, session_status};
use crate::server::AppState;

/// Body of `POST /send-message/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageForm {
    /// Destination phone number, any formatting.
    #[serde(default)]
    pub number: Option<String>,
    /// Message body.
    #[serde(default)]
    pub message: Option<String>,
}

fn qr_location(id: &str) -> String {
    format!("/qr/{id}")
}

fn send_location(id: &str) -> String {
    format!("/send-message/{id}")
}

fn error_response(err: &SessionError) -> Response {
    let status = session_status(err);
    let title = status.canonical_reason().unwrap_or("Error");
    (status, Html(pages::error_page(title, &err.to_string()))).into_response()
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(pages::index_page(&state.manager.list()))
}

/// `GET /start-session`: create a session and go to its pairing page.
pub async fn start_session(State(state): State<AppState>) -> Response {
    match state.manager.start_session().await {
        Ok(view) => Redirect::to(&qr_location(view.id.as_str())).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to start session");
            error_response(&e)
        }
    }
}

/// `GET /qr/{id}`
pub async fn qr(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let view = match state.manager.get(&id) {
        Ok(view) => view,
        Err(e) => return error_response(&e),
    };
    match (view.state, view.qr_payload.as_deref()) {
        (SessionState::Ready, _) => Redirect::to(&send_location(&id)).into_response(),
        (SessionState::AwaitingScan, Some(payload)) => {
            Html(pages::qr_page(&view, payload)).into_response()
        }
        _ => Html(pages::pending_page(&view)).into_response(),
    }
}

/// `GET /send-message/{id}`: the send form, or back to the pairing page.
pub async fn send_form(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.get(&id) {
        Ok(view) if view.state == SessionState::Ready => {
            Html(pages::send_form_page(&view)).into_response()
        }
        Ok(_) => Redirect::to(&qr_location(&id)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /send-message/{id}`
///
/// Unknown session 404, missing field 400, not ready 409, delivery failure
/// 500. On success, back to the pairing page.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: Result<Form<SendMessageForm>, FormRejection>,
) -> Response {
    let form = form.map(|Form(f)| f).unwrap_or_else(|rejection| {
        debug!(session_id = %id, error = %rejection, "unreadable send form");
        SendMessageForm::default()
    });
    let number = form.number.unwrap_or_default();
    let message = form.message.unwrap_or_default();

    match state.manager.send_message(&id, &number, &message).await {
        Ok(()) => Redirect::to(&qr_location(&id)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /logout/{id}`
pub async fn logout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusBody>, GatewayError> {
    state.manager.logout(&id).await.map_err(|e| match e {
        SessionError::NotFound(_) | SessionError::Teardown { .. } | SessionError::Client { .. } => {
            GatewayError::from(e)
        }
        // any other failure is reported as a failed teardown (500)
        other => GatewayError::from(SessionError::Teardown {
            session_id: id.as_str().into(),
            message: other.to_string(),
        }),
    })?;
    Ok(Json(StatusBody::success(format!("session {id} logged out"))))
}
