//! Request, query and response shapes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{GeometryError, TerminalGeometry};
use crate::process_id::ProcessId;

/// Body of a create response when the server could not spawn the process.
///
/// The value is never a valid [`ProcessId`]. Callers must not compare against
/// it directly; go through [`CreateOutcome`] instead.
pub const SPAWN_FAILED_BODY: &str = "-1";

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTerminalRequest {
    /// Workspace root URI (usually `file:///...`), used as the working directory hint.
    #[serde(default)]
    pub uri: Option<String>,
}

/// `?cols=&rows=` query on create and resize requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryQuery {
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,
}

impl GeometryQuery {
    pub fn from_geometry(geometry: TerminalGeometry) -> Self {
        Self {
            cols: Some(geometry.cols()),
            rows: Some(geometry.rows()),
        }
    }

    /// Resolve the query, taking missing dimensions from `fallback`.
    pub fn resolve(&self, fallback: TerminalGeometry) -> Result<TerminalGeometry, GeometryError> {
        TerminalGeometry::new(
            self.cols.unwrap_or(fallback.cols()),
            self.rows.unwrap_or(fallback.rows()),
        )
    }
}

/// Malformed create response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("create response body was empty")]
    EmptyCreateResponse,
}

/// Result of a create call as carried on the wire.
///
/// This is the single place where the `-1` sentinel is produced and
/// recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ProcessId),
    SpawnFailed,
}

impl CreateOutcome {
    /// Encode as the plain-text response body.
    pub fn to_body(&self) -> String {
        match self {
            Self::Created(id) => id.to_string(),
            Self::SpawnFailed => SPAWN_FAILED_BODY.to_string(),
        }
    }

    /// Decode a plain-text response body.
    pub fn from_body(body: &str) -> Result<Self, ProtocolError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ProtocolError::EmptyCreateResponse);
        }
        if body == SPAWN_FAILED_BODY {
            return Ok(Self::SpawnFailed);
        }
        Ok(Self::Created(ProcessId::new(body)))
    }

    pub fn into_process_id(self) -> Option<ProcessId> {
        match self {
            Self::Created(id) => Some(id),
            Self::SpawnFailed => None,
        }
    }
}

/// Entry of the terminal list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub id: ProcessId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub cols: u16,
    pub rows: u16,
}
