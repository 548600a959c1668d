//! JSON polling endpoints.

use axum::Json;
use axum::extract::{Path, State};
use pairline_runtime::SessionView;

use crate::errors::GatewayError;
use crate::server::AppState;

/// `GET /api/sessions`: every live session, oldest first.
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionView>> {
    Json(state.manager.list())
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, GatewayError> {
    Ok(Json(state.manager.get(&id)?))
}
