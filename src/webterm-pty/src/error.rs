//! Errors raised while creating or driving a PTY process.

use thiserror::Error;

/// PTY process error.
#[derive(Debug, Error)]
pub enum PtyError {
    /// The pseudo-terminal pair could not be opened (resource exhaustion,
    /// unsupported platform).
    #[error("Failed to open PTY with size {cols}x{rows}: {message}")]
    Open { cols: u16, rows: u16, message: String },

    /// The child process could not be started (missing executable, bad cwd).
    #[error("Failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    /// The PTY master refused a window-size change.
    #[error("Failed to resize PTY: {0}")]
    Resize(String),

    /// An I/O helper thread could not be started.
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for PTY operations.
pub type PtyResult<T> = Result<T, PtyError>;
