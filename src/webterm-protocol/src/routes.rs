//! HTTP and WebSocket paths served by the terminal server.

use crate::process_id::ProcessId;

/// Base path of the terminal service. Create and list live here; the
/// per-terminal stream, resize and release routes hang off it.
pub const TERMINALS_PATH: &str = "/services/terminals";

/// Health probe path.
pub const HEALTH_PATH: &str = "/health";

/// `<base>/<id>`: stream (WebSocket) and release (DELETE).
pub fn terminal_path(id: &ProcessId) -> String {
    format!("{TERMINALS_PATH}/{id}")
}

/// `<base>/<id>/size`: resize.
pub fn size_path(id: &ProcessId) -> String {
    format!("{TERMINALS_PATH}/{id}/size")
}
