//! Client side of webterm.
//!
//! This crate provides:
//! - [`TerminalWidget`], the lifecycle of one remote terminal: create,
//!   attach, input, debounced resize and teardown
//! - [`TerminalBackend`], the transport seam, with [`HttpTerminalBackend`]
//!   speaking HTTP and WebSocket to a webterm server
//! - [`Endpoint`], REST and WebSocket URLs derived from one base address
//! - [`contribution`], the "New Terminal" command and a numbered widget
//!   factory for hosting shells
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webterm_client::{
//!     Endpoint, FixedWorkspaceRoot, HttpTerminalBackend, TerminalWidget, TerminalWidgetOptions,
//! };
//!
//! let backend = HttpTerminalBackend::new(Endpoint::parse("http://127.0.0.1:55580")?)?;
//! let widget = TerminalWidget::new(
//!     TerminalWidgetOptions::new("terminal-0", "Terminal 0"),
//!     Arc::new(backend),
//!     Arc::new(FixedWorkspaceRoot(Some("file:///home/user/project".into()))),
//!     emulator,
//! );
//! widget.start().await?;
//! widget.send_input(&b"ls\r"[..]);
//! ```

pub mod backend;
pub mod contribution;
pub mod debounce;
pub mod endpoint;
pub mod error;
pub mod widget;

// Re-export main types
pub use backend::{ConnectionRemote, HttpTerminalBackend, TerminalBackend, TerminalConnection};
pub use contribution::{TerminalCommands, TerminalFactory};
pub use endpoint::{DEFAULT_ENDPOINT, Endpoint};
pub use error::{ClientError, ClientResult};
pub use widget::{
    FixedWorkspaceRoot, TERMINATED_TITLE, TerminalEmulator, TerminalWidget,
    TerminalWidgetOptions, WidgetState, WorkspaceRoot,
};
