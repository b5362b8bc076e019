//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WatchpostSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `WATCHPOST_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::WatchpostSettings;

/// Resolve the default settings file (`~/.watchpost/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".watchpost").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WatchpostSettings> {
    load_settings_from_path(&settings_path())
}

/// [`load_report_from_path`] on the default path.
pub fn load_report() -> Result<LoadReport> {
    load_report_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// [`WatchpostSettings::validate`] is an error. Ignored overrides are
/// logged immediately; use [`load_report_from_path`] to log them later.
pub fn load_settings_from_path(path: &Path) -> Result<WatchpostSettings> {
    let report = load_report_from_path(path)?;
    report.log_ignored();
    Ok(report.settings)
}

/// Like [`load_settings_from_path`], but hands back the ignored overrides
/// instead of logging them. For callers that load settings before a
/// subscriber exists.
pub fn load_report_from_path(path: &Path) -> Result<LoadReport> {
    let mut settings = load_file_layer(path)?;
    let ignored = apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(LoadReport { settings, ignored })
}

/// An environment override that was set but could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// Variable name.
    pub key: &'static str,
    /// Raw value.
    pub value: String,
}

/// Loaded settings plus the overrides that were skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    /// Effective settings.
    pub settings: WatchpostSettings,
    /// Overrides dropped for invalid values.
    pub ignored: Vec<IgnoredOverride>,
}

impl LoadReport {
    /// Emit one warning per ignored override.
    pub fn log_ignored(&self) {
        for o in &self.ignored {
            warn!(key = o.key, value = %o.value, "invalid env var, ignoring");
        }
    }
}

fn load_file_layer(path: &Path) -> Result<WatchpostSettings> {
    let defaults = serde_json::to_value(WatchpostSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `WATCHPOST_*` environment overrides from the process environment.
pub fn apply_env_overrides(settings: &mut WatchpostSettings) -> Vec<IgnoredOverride> {
    apply_overrides_from(settings, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are skipped and returned; the file/default value is
/// kept. Empty strings count as unset.
pub fn apply_overrides_from<F>(settings: &mut WatchpostSettings, lookup: F) -> Vec<IgnoredOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut ignored = Vec::new();
    let mut skip = |key: &'static str, value: String| ignored.push(IgnoredOverride { key, value });

    if let Some(v) = read("WATCHPOST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("WATCHPOST_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => skip("WATCHPOST_PORT", v),
        }
    }
    if let Some(v) = read("WATCHPOST_PATH") {
        if v.starts_with('/') {
            settings.server.path = v;
        } else {
            skip("WATCHPOST_PATH", v);
        }
    }
    if let Some(v) = read("WATCHPOST_APP_KEYS") {
        settings.auth.app_keys = parse_list(&v);
    }
    if let Some(v) = read("WATCHPOST_PRINCIPAL") {
        settings.auth.principal = v;
    }
    if let Some(v) = read("WATCHPOST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("WATCHPOST_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => skip("WATCHPOST_LOG_JSON", v),
        }
    }
    ignored
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma separated list, trimming entries and dropping empty ones.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
