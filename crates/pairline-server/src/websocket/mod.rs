//! WebSocket push channel.
//!
//! - [`connection`]: per-client queue, session binding, drop accounting
//! - [`broadcast`]: fan-out of lifecycle events to matching clients
//! - [`event_bridge`]: notification bus → broadcast manager
//! - [`handler`] / [`session`]: upgrade and per-connection loop

pub mod broadcast;
pub mod connection;
pub mod event_bridge;
pub mod handler;
pub mod session;
