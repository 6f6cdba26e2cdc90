//! Terminal viewport geometry.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default terminal width in columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal height in rows.
pub const DEFAULT_ROWS: u16 = 24;

/// Rejected geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("terminal must have at least one column")]
    ZeroColumns,
    #[error("terminal must have at least one row")]
    ZeroRows,
}

/// Terminal size in character cells.
///
/// Both dimensions are at least 1; the only way to build one is through
/// [`TerminalGeometry::new`], so a value in hand is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry", into = "RawGeometry")]
pub struct TerminalGeometry {
    cols: u16,
    rows: u16,
}

impl TerminalGeometry {
    pub fn new(cols: u16, rows: u16) -> Result<Self, GeometryError> {
        if cols == 0 {
            return Err(GeometryError::ZeroColumns);
        }
        if rows == 0 {
            return Err(GeometryError::ZeroRows);
        }
        Ok(Self { cols, rows })
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl fmt::Display for TerminalGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[derive(Serialize, Deserialize)]
struct RawGeometry {
    cols: u16,
    rows: u16,
}

impl TryFrom<RawGeometry> for TerminalGeometry {
    type Error = GeometryError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        Self::new(raw.cols, raw.rows)
    }
}

impl From<TerminalGeometry> for RawGeometry {
    fn from(geometry: TerminalGeometry) -> Self {
        Self {
            cols: geometry.cols,
            rows: geometry.rows,
        }
    }
}
