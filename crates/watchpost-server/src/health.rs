//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::registry::SessionRegistry;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Whether the debugger channel accepts sessions.
    pub started: bool,
    /// Sessions waiting to authenticate.
    pub pending: usize,
    /// Authenticated sessions.
    pub authenticated: usize,
    /// Seconds since the server was created.
    pub uptime_secs: u64,
}

/// Build a health response from the live registry.
pub fn health_check(start_time: Instant, registry: &SessionRegistry) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        started: registry.is_started(),
        pending: registry.pending_count(),
        authenticated: registry.authenticated_count(),
        uptime_secs: start_time.elapsed().as_secs(),
    }
}
