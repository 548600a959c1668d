//! `/health` report: gateway liveness plus a per-state session tally.

use std::collections::BTreeMap;
use std::time::Instant;

use pairline_runtime::SessionView;
use serde::Serialize;

/// Overall gateway status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    /// Accepting requests.
    Ok,
    /// Shutdown requested; new work should go elsewhere.
    ShuttingDown,
}

/// Body of `GET /health`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Gateway status.
    pub status: GatewayStatus,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered push-channel clients.
    pub push_connections: usize,
    /// Live sessions.
    pub sessions: usize,
    /// Live sessions keyed by state wire name. States with no session are omitted.
    pub sessions_by_state: BTreeMap<&'static str, usize>,
}

/// Build the report from live counters and the current session snapshots.
pub fn health_check(
    start_time: Instant,
    shutting_down: bool,
    push_connections: usize,
    sessions: &[SessionView],
) -> HealthReport {
    let mut sessions_by_state = BTreeMap::new();
    for view in sessions {
        *sessions_by_state.entry(view.state.as_str()).or_insert(0) += 1;
    }
    HealthReport {
        status: if shutting_down {
            GatewayStatus::ShuttingDown
        } else {
            GatewayStatus::Ok
        },
        uptime_secs: start_time.elapsed().as_secs(),
        push_connections,
        sessions: sessions.len(),
        sessions_by_state,
    }
}
