//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields take their compiled default.

mod auth;
mod logging;
mod server;

pub use auth::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9450, "path": "/debugger" },
///   "auth": { "appKeys": ["..."] },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchpostSettings {
    /// Listener and per-session transport settings.
    pub server: ServerSettings,
    /// Credential settings.
    pub auth: AuthSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl WatchpostSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.path must start with '/': {:?}",
                self.server.path
            )));
        }
        if self.server.path == "/health" {
            return Err(SettingsError::InvalidValue(
                "server.path collides with /health".to_string(),
            ));
        }
        if self.server.send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueue must be at least 1".to_string(),
            ));
        }
        if self.server.heartbeat_timeout_secs <= self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must exceed heartbeatIntervalSecs".to_string(),
            ));
        }
        if self.auth.principal.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.principal must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
