//! webterm protocol - types exchanged between the terminal server and its clients.
//!
//! The transport is deliberately small:
//!
//! - `POST /services/terminals?cols=&rows=` with a [`CreateTerminalRequest`] body
//!   answers a plain-text [`ProcessId`] (or the spawn-failure sentinel, see
//!   [`CreateOutcome`]).
//! - `POST /services/terminals/{id}/size?cols=&rows=` resizes a live terminal.
//! - `DELETE /services/terminals/{id}` releases a terminal.
//! - A WebSocket on `/services/terminals/{id}` carries raw process I/O.

pub mod geometry;
pub mod messages;
pub mod process_id;
pub mod routes;

pub use geometry::{DEFAULT_COLS, DEFAULT_ROWS, GeometryError, TerminalGeometry};
pub use messages::{
    CreateOutcome, CreateTerminalRequest, GeometryQuery, ProtocolError, SPAWN_FAILED_BODY,
    TerminalSummary,
};
pub use process_id::ProcessId;
