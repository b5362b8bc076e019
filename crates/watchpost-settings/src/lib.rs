//! # watchpost-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WatchpostSettings::default()`]
//! 2. **Settings file**: `~/.watchpost/settings.json` or an explicit path,
//!    deep-merged over defaults
//! 3. **Environment variables**: `WATCHPOST_*` overrides
//!
//! The binary applies its command line flags on top of the result.
//!
//! ```no_run
//! let settings = watchpost_settings::load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    IgnoredOverride, LoadReport, apply_env_overrides, apply_overrides_from, deep_merge,
    load_report, load_report_from_path, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_under_home_dir() {
        let path = settings_path();
        assert!(path.ends_with(".watchpost/settings.json"));
    }
}
