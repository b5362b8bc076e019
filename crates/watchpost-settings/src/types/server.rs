//! Listener and transport settings.

use serde::{Deserialize, Serialize};

/// Listener and per-session transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. `0` picks an ephemeral port.
    pub port: u16,
    /// Path of the debugger WebSocket endpoint.
    pub path: String,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per session before delivery fails.
    pub send_queue: usize,
    /// Upper bound on a single socket write, in milliseconds.
    pub send_timeout_ms: u64,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a session is dropped.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9450,
            path: "/debugger".to_string(),
            max_message_size: 64 * 1024,
            send_queue: 256,
            send_timeout_ms: 5000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}
