//! Command-line interface for the relay server.
//!
//! Used both by the standalone `tunnel-server` binary and as the `server`
//! subcommand of the unified `quick-tunnel` CLI.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
};
use tunnel_config::{
    CliOverrides, LoggingConfig, apply_env, apply_overrides, load_or_default, validate_config,
};

use crate::{CancellationToken, run_with_shutdown};

/// Relay server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "tunnel-server", version, about = "Rendezvous WebSocket tunnel relay")]
pub struct ServerArgs {
    /// Config file path (json/jsonc/yaml/toml). Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Run the relay server with the given arguments.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_or_default(args.config.as_deref())?;
    apply_env(&mut config);
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;

    init_tracing(&config.logging);
    info!(version = tunnel_core::VERSION, "starting {}", tunnel_core::PROJECT_NAME);
    if let Some(path) = &args.config {
        info!(path = %path.display(), "configuration loaded");
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    run_with_shutdown(config, shutdown).await?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Filter directive: base level followed by per-module overrides.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();

    let mut directives = config.level.as_deref().unwrap_or("info").to_string();
    for (module, level) in filters {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Install the global tracing subscriber.
///
/// `format` is one of json, compact or pretty (default); `output` is stdout
/// or stderr (default). A subscriber that is already installed is kept.
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match config.output.as_deref() {
        Some("stdout") => BoxMakeWriter::new(io::stdout),
        _ => BoxMakeWriter::new(io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format.as_deref() {
        Some("json") => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        Some("compact") => registry
            .with(fmt::layer().compact().with_writer(writer))
            .try_init(),
        _ => registry.with(fmt::layer().with_writer(writer)).try_init(),
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directives_sorted_after_base() {
        let mut config = LoggingConfig {
            level: Some("warn".into()),
            ..LoggingConfig::default()
        };
        config.filters.insert("tunnel_server".into(), "info".into());
        config.filters.insert("tunnel_relay".into(), "debug".into());
        assert_eq!(
            filter_directives(&config),
            "warn,tunnel_relay=debug,tunnel_server=info"
        );
    }

    #[test]
    fn filter_defaults_to_info() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }

    #[test]
    fn args_parse_overrides() {
        let args = ServerArgs::parse_from([
            "tunnel-server",
            "--listen",
            ":5000",
            "--channel-capacity",
            "16",
        ]);
        assert!(args.config.is_none());
        assert_eq!(args.overrides.listen.as_deref(), Some(":5000"));
        assert_eq!(args.overrides.channel_capacity, Some(16));
    }
}
