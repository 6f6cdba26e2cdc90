//! Terminal management endpoints: create, resize, release and list.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{debug, error, warn};
use webterm_protocol::{
    CreateOutcome, CreateTerminalRequest, GeometryQuery, ProcessId, TerminalGeometry,
    TerminalSummary,
};

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::workspace::working_dir_for;

/// Spawn a terminal and answer its id as plain text.
///
/// A spawn failure is not an HTTP error: the body is the `-1` sentinel.
pub async fn create_terminal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeometryQuery>,
    body: Bytes,
) -> AppResult<String> {
    let request: CreateTerminalRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateTerminalRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let geometry = query.resolve(TerminalGeometry::default())?;
    let cwd = working_dir_for(request.uri.as_deref());

    let outcome = match state.registry.allocate(geometry, cwd).await {
        Ok(id) => CreateOutcome::Created(id),
        Err(e) => {
            error!(
                error = %e,
                cols = geometry.cols(),
                rows = geometry.rows(),
                "Failed to spawn terminal"
            );
            CreateOutcome::SpawnFailed
        }
    };

    Ok(outcome.to_body())
}

/// Resize a live terminal. Unknown ids are ignored.
pub async fn resize_terminal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
    Query(query): Query<GeometryQuery>,
) -> AppResult<StatusCode> {
    let Some(process) = state.registry.get(&id).await else {
        debug!(terminal_id = %id, "Resize of unknown terminal ignored");
        return Ok(StatusCode::OK);
    };

    let geometry = query.resolve(process.geometry())?;
    process.resize(geometry).map_err(|e| {
        warn!(terminal_id = %id, error = %e, "Resize failed");
        AppError::Internal(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Terminate a terminal. Releasing an unknown id succeeds.
pub async fn release_terminal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
) -> StatusCode {
    state.registry.release(&id).await;
    StatusCode::NO_CONTENT
}

/// List live terminals.
pub async fn list_terminals(State(state): State<Arc<AppState>>) -> Json<Vec<TerminalSummary>> {
    Json(state.registry.list().await)
}
