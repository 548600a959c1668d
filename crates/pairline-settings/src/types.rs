//! Settings types. Every section is `#[serde(default)]` so a partial file
//! only overrides the keys it names.

use pairline_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings object (`~/.pairline/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairlineSettings {
    /// HTTP gateway settings.
    pub server: ServerSettings,
    /// Session lifecycle settings.
    pub sessions: SessionSettings,
    /// External messaging-client settings.
    pub client: ClientSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// HTTP gateway network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum concurrent push-channel connections.
    pub max_connections: usize,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 100,
            heartbeat_interval_secs: 30,
        }
    }
}

/// Session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Root directory of per-session credential stores.
    pub auth_dir: String,
    /// Capacity of each session's command queue.
    pub command_buffer: usize,
    /// Capacity of each client's event channel.
    pub event_buffer: usize,
    /// Capacity of the notification bus.
    pub bus_capacity: usize,
    /// How long process shutdown waits for clients to be destroyed.
    pub shutdown_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auth_dir: ".pairline_auth".to_string(),
            command_buffer: 32,
            event_buffer: 64,
            bus_capacity: 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// External messaging-client (sidecar) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Executable spawned once per session.
    pub command: String,
    /// Extra arguments placed before the per-session arguments.
    pub args: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            command: "pairline-bridge".to_string(),
            args: Vec::new(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
