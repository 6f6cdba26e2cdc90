//! webterm server - PTY-backed terminals over HTTP and WebSocket.
//!
//! This crate provides:
//! - A registry of live terminal processes keyed by [`webterm_protocol::ProcessId`]
//! - REST endpoints to create, resize, release and list terminals
//! - A WebSocket stream per terminal carrying raw I/O
//! - Health checks
//!
//! Terminals belong to the server instance: shutting the server down
//! terminates every process it started.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod stream;
pub mod workspace;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use registry::{SpawnError, TerminalRegistry};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Starting webterm server on {}", listener.local_addr()?);

    serve(listener, Arc::new(AppState::new(config)), shutdown).await
}

/// Serve on an already bound listener.
///
/// When `shutdown` resolves every terminal is released, which closes the
/// open streams; connections still open after `shutdown_timeout` are
/// abandoned.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let timeout = state.config.shutdown_timeout_duration();
    let registry = Arc::clone(&state.registry);
    let started = Arc::new(Notify::new());
    let started_signal = Arc::clone(&started);

    let signal = async move {
        shutdown.await;
        info!("Server shutting down, releasing terminals...");
        registry.release_all().await;
        started_signal.notify_one();
    };

    let app = create_router_with_state(state);
    let server = async move { axum::serve(listener, app).with_graceful_shutdown(signal).await };

    tokio::select! {
        result = server => result?,
        _ = async {
            started.notified().await;
            tokio::time::sleep(timeout).await;
        } => {
            warn!("Graceful shutdown timed out after {}s", timeout.as_secs());
        }
    }

    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
///
/// Keep a clone of the state to reach the registry after the router is built.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    api::routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
