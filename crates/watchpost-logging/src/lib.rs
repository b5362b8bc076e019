//! # watchpost-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the process-wide subscriber (compact text
//!   or JSON lines on stderr, `RUST_LOG` overriding the configured level)
//! - [`capture_logs`] installs a thread-local in-memory subscriber so tests
//!   can assert on emitted events

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Output format of the process-wide subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human readable lines.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// `Json` when `json` is set, `Compact` otherwise.
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Compact }
    }
}

/// Build the filter: `RUST_LOG` when set and valid, `level` otherwise.
///
/// An unparsable `level` falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber on stderr.
///
/// Call once at startup. Later calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = build_filter(level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails only when a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
