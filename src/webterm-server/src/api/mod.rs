//! HTTP routes of the terminal service.

mod health;
mod terminals;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use webterm_protocol::routes::{HEALTH_PATH, TERMINALS_PATH};

use crate::state::AppState;
use crate::stream;

pub use types::HealthResponse;

/// Create the API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(HEALTH_PATH, get(health::health_check))
        .route(
            TERMINALS_PATH,
            get(terminals::list_terminals).post(terminals::create_terminal),
        )
        // Stream (WebSocket upgrade) and release share the per-terminal path
        .route(
            &format!("{TERMINALS_PATH}/{{id}}"),
            get(stream::terminal_stream).delete(terminals::release_terminal),
        )
        .route(
            &format!("{TERMINALS_PATH}/{{id}}/size"),
            post(terminals::resize_terminal),
        )
}
