//! webterm server binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use webterm_server::{ServerConfig, run_with_shutdown};

/// webterm terminal server
#[derive(Parser)]
#[command(name = "webterm-server")]
#[command(about = "Serves PTY-backed terminals over HTTP and WebSocket")]
#[command(version)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address (overrides config and environment)
    #[arg(short, long)]
    listen: Option<String>,

    /// Shell to run in new terminals
    #[arg(long)]
    shell: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging is not up yet, so configuration errors go straight to stderr.
    let loaded = match &args.config {
        Some(path) => ServerConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {path}: {e}")),
        None => ServerConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config from environment: {e}")),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(shell) = args.shell {
        config.terminal.shell = Some(shell);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }

    setup_logging(&config.logging.level, config.logging.is_json());

    info!("Starting webterm server on {}", config.listen_addr);
    info!("Graceful shutdown timeout: {}s", config.shutdown_timeout);
    info!("Press Ctrl+C to stop");

    let shutdown_timeout = config.shutdown_timeout;

    // Create shutdown signal
    let shutdown = async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, shutting down (timeout: {}s)...", shutdown_timeout);
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down (timeout: {}s)...", shutdown_timeout);
            }
        }
    };

    if let Err(e) = run_with_shutdown(config, shutdown).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
