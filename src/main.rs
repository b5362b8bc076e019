//! # watchpost
//!
//! Debugger bridge binary. Loads settings, starts the WebSocket listener and
//! opens the debugger channel. With `--relay-stdin`, every line read from
//! standard input is pushed to authenticated clients.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use watchpost_debugger::DebuggerController;
use watchpost_logging::LogFormat;
use watchpost_server::{DebugServer, ServerConfig};
use watchpost_settings::{LoadReport, WatchpostSettings};

/// Observing debugger bridge.
#[derive(Parser, Debug)]
#[command(name = "watchpost", about = "Observing debugger bridge")]
struct Cli {
    /// Settings file (defaults to `~/.watchpost/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Additional accepted app key. Repeatable.
    #[arg(long = "app-key")]
    app_keys: Vec<String>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Broadcast each line read from stdin.
    #[arg(long)]
    relay_stdin: bool,
}

impl Cli {
    fn apply(&self, settings: &mut WatchpostSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        settings.auth.app_keys.extend(self.app_keys.iter().cloned());
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

/// Settings plus CLI overrides. Ignored env overrides are left in the
/// report for logging once the subscriber is up.
fn load(cli: &Cli) -> Result<LoadReport> {
    let mut report = match cli.config {
        Some(ref path) => watchpost_settings::load_report_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => watchpost_settings::load_report().context("Failed to load settings")?,
    };
    cli.apply(&mut report.settings);
    Ok(report)
}

async fn relay_stdin(controller: Arc<DebuggerController>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let report = controller.send_message(&line);
                tracing::debug!(delivered = report.delivered, failed = report.failed, "relayed line");
            }
            Ok(None) => {
                tracing::info!("stdin closed, relay finished");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, relay finished");
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let report = load(&cli)?;
    let settings = &report.settings;

    watchpost_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );
    report.log_ignored();

    let validator = settings.auth.validator();
    if validator.is_empty() {
        tracing::warn!("no app keys configured, no client can authenticate");
    }

    let server = DebugServer::new(ServerConfig::from_settings(settings), Arc::new(validator));
    let (addr, handle) = server.listen().await.context("Failed to start listener")?;
    let controller = Arc::new(DebuggerController::for_server(&server));
    controller.start();

    tracing::info!(%addr, path = %server.config().path, "debugger endpoint ready");

    let relay = cli
        .relay_stdin
        .then(|| tokio::spawn(relay_stdin(controller.clone())));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if let Some(relay) = relay {
        relay.abort();
    }
    let closed = controller.stop();
    tracing::info!(closed, "debugger channel stopped");
    server.shutdown().graceful_shutdown(vec![handle], None).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
