//! # pairline-server
//!
//! Session gateway: Axum HTTP routes for the browser pairing flow, JSON
//! status endpoints, and a WebSocket push channel fed by the notification
//! bus.
//!
//! - [`server::PairlineServer`]: router, listener, event bridge
//! - [`routes`]: `/start-session`, `/qr/{id}`, `/send-message/{id}`, `/logout/{id}`, `/api/*`
//! - [`websocket`]: push connections and event fan-out
//! - [`shutdown::ShutdownCoordinator`]: cancellation and task draining

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::GatewayError;
pub use server::{AppState, PairlineServer};
pub use shutdown::ShutdownCoordinator;
