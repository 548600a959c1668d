//! `PairlineServer`: Axum HTTP gateway and WebSocket push channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use pairline_runtime::SessionManager;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, GatewayStatus, HealthReport};
use crate::routes::{self, api};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::event_bridge::EventBridge;
use crate::websocket::handler::ws_handler;
use crate::websocket::session::WsSessionConfig;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle manager.
    pub manager: Arc<SessionManager>,
    /// Push-channel fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Per-connection settings for push sessions.
    pub fn ws_config(&self) -> WsSessionConfig {
        WsSessionConfig {
            send_queue: self.config.send_queue,
            ping_interval: self.config.heartbeat_interval(),
            pong_timeout: self.config.heartbeat_timeout(),
        }
    }
}

/// The gateway.
pub struct PairlineServer {
    config: Arc<ServerConfig>,
    manager: Arc<SessionManager>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl PairlineServer {
    /// Create a server around a session manager.
    pub fn new(config: ServerConfig, manager: Arc<SessionManager>, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            manager,
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            manager: self.manager.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(routes::index))
            .route("/start-session", get(routes::start_session))
            .route("/qr/{id}", get(routes::qr))
            .route(
                "/send-message/{id}",
                get(routes::send_form).post(routes::send_message),
            )
            .route("/logout/{id}", post(routes::logout))
            .route("/api/sessions", get(api::list_sessions))
            .route("/api/sessions/{id}", get(api::get_session))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind, start the event bridge, and serve until shutdown.
    ///
    /// Both tasks are tracked by the [`ShutdownCoordinator`]. Returns the
    /// bound address (useful with port 0).
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let bridge = EventBridge::new(self.manager.subscribe(), self.broadcast.clone());
        self.shutdown
            .track(tokio::spawn(bridge.run(self.shutdown.token())));

        let router = self.router();
        let token = self.shutdown.token();
        self.shutdown.track(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "gateway server error");
            }
            info!("gateway stopped");
        }));

        info!(addr = %local_addr, "gateway listening");
        Ok(local_addr)
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the session manager.
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }
}

/// GET /health. 503 once shutdown has started.
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = health::health_check(
        state.start_time,
        state.shutdown.is_shutting_down(),
        state.broadcast.connection_count(),
        &state.manager.list(),
    );
    let status = match report.status {
        GatewayStatus::Ok => StatusCode::OK,
        GatewayStatus::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}
