//! `GET /ws` upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Deserialize;
use tracing::warn;

use super::session::run_ws_session;
use crate::errors::GatewayError;
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::server::AppState;

/// Query string of `GET /ws`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    /// Follow only this session.
    pub session_id: Option<String>,
}

/// Upgrade to a push session.
///
/// Refused with 503 when no connection slot is free and 404 when binding to
/// an unknown session. The slot is reserved before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let limit = state.config.max_connections;
    let Some(slot) = state.broadcast.try_reserve(limit) else {
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(limit, "refusing push connection");
        return GatewayError::TooManyConnections(limit).into_response();
    };

    let bind = match params.session_id {
        Some(id) => match state.manager.get(&id) {
            Ok(view) => Some(view.id),
            Err(e) => return GatewayError::from(e).into_response(),
        },
        None => None,
    };

    let client_id = format!("ws_{}", uuid::Uuid::now_v7());
    let broadcast = state.broadcast.clone();
    let config = state.ws_config();
    let cancel = state.shutdown.token();
    ws.on_upgrade(move |socket| async move {
        // the slot is held for the life of the session
        let _slot = slot;
        run_ws_session(socket, client_id, bind, broadcast, config, cancel).await;
    })
}
