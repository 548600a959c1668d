//! Server configuration.

use std::time::Duration;

use pairline_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a push connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Outbound queue length per push connection.
    pub send_queue: usize,
}

impl ServerConfig {
    /// Build from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_interval_secs.saturating_mul(3),
            ..Self::default()
        }
    }

    /// Heartbeat interval, at least one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Pong timeout, never shorter than the interval.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs).max(self.heartbeat_interval())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 100,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue: 256,
        }
    }
}
