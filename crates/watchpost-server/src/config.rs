//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use watchpost_settings::WatchpostSettings;

/// Configuration for the debugger server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Path of the debugger WebSocket endpoint.
    pub path: String,
    /// Principal whose application keys authenticate sessions.
    pub principal: String,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per session.
    pub send_queue: usize,
    /// Upper bound on one socket write, in milliseconds.
    pub send_timeout_ms: u64,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect after this many seconds without inbound activity.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&WatchpostSettings::default())
    }
}

impl ServerConfig {
    /// Take the server-relevant parts of loaded settings.
    pub fn from_settings(settings: &WatchpostSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            path: server.path.clone(),
            principal: settings.auth.principal.clone(),
            max_message_size: server.max_message_size,
            send_queue: server.send_queue,
            send_timeout_ms: server.send_timeout_ms,
            heartbeat_interval_secs: server.heartbeat_interval_secs,
            heartbeat_timeout_secs: server.heartbeat_timeout_secs,
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Socket write timeout.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Liveness timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 9450);
        assert_eq!(cfg.path, "/debugger");
        assert_eq!(cfg.principal, "Administrator");
        assert_eq!(cfg.send_queue, 256);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9450");
    }

    #[test]
    fn durations() {
        let cfg = ServerConfig {
            send_timeout_ms: 250,
            heartbeat_interval_secs: 0,
            heartbeat_timeout_secs: 45,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.send_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn from_custom_settings() {
        let mut settings = WatchpostSettings::default();
        settings.server.port = 0;
        settings.auth.principal = "ops".into();
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.principal, "ops");
    }
}
