//! PTY-backed terminal processes for the webterm server.
//!
//! A [`PtyProcess`] owns one interactive child process attached to a
//! pseudo-terminal and exposes the small surface the transport needs:
//!
//! - [`PtyProcess::write`] forwards raw input bytes
//! - [`PtyProcess::resize`] updates the window size
//! - [`PtyProcess::take_output`] hands out the output stream, once
//! - [`PtyProcess::terminate`] signals the child, idempotently
//! - [`PtyProcess::wait_exit`] resolves when the child exits
//!
//! Blocking PTY I/O runs on dedicated threads; everything observable from
//! async code goes through tokio channels.
//!
//! # Platform Support
//!
//! - **Linux**: Full support via native PTY
//! - **macOS**: Full support via native PTY
//! - **Windows**: Support via ConPTY (Windows 10+)
//!
//! # Example
//!
//! ```ignore
//! use webterm_protocol::{ProcessId, TerminalGeometry};
//! use webterm_pty::{PtyProcess, ShellCommand};
//!
//! let process = PtyProcess::spawn(
//!     ProcessId::generate(),
//!     &ShellCommand::default_shell().cwd("/home/user"),
//!     TerminalGeometry::default(),
//! )?;
//! let mut output = process.take_output().expect("output taken once");
//! process.write(b"ls\r");
//! while let Some(chunk) = output.recv().await {
//!     // ...
//! }
//! ```

mod command;
mod error;
mod process;

pub use command::ShellCommand;
pub use error::{PtyError, PtyResult};
pub use process::{ExitInfo, OutputStream, PtyProcess};

// Re-export core types from portable-pty for convenient access
pub use portable_pty::PtySize;

use webterm_protocol::TerminalGeometry;

/// Convert a geometry into the size structure portable-pty expects.
#[must_use]
pub fn pty_size(geometry: TerminalGeometry) -> PtySize {
    PtySize {
        rows: geometry.rows(),
        cols: geometry.cols(),
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Returns the default shell for the current platform.
///
/// - **Windows**: Returns PowerShell if available, otherwise `cmd.exe`
/// - **macOS**: Returns `SHELL` environment variable or `/bin/zsh`
/// - **Linux**: Returns `SHELL` environment variable or `/bin/bash`
#[must_use]
pub fn default_shell() -> String {
    #[cfg(target_os = "windows")]
    {
        let pwsh_paths = [
            "C:\\Program Files\\PowerShell\\7\\pwsh.exe",
            "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe",
        ];
        for path in pwsh_paths {
            if std::path::Path::new(path).exists() {
                return path.to_string();
            }
        }
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/zsh".to_string())
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}
