//! Glue for hosting shells: the "New Terminal" command and a widget factory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::info;
use webterm_protocol::TerminalGeometry;

use crate::backend::TerminalBackend;
use crate::error::ClientResult;
use crate::widget::{
    DEFAULT_RESIZE_DEBOUNCE, TerminalEmulator, TerminalWidget, TerminalWidgetOptions,
    WorkspaceRoot,
};

/// A command a hosting shell can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub id: &'static str,
    pub label: &'static str,
}

/// A key chord bound to a command. `ctrlcmd` is Ctrl, or Cmd on macOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keybinding {
    pub command: &'static str,
    pub keys: &'static str,
}

/// A command placed in a menu group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuAction {
    pub menu_path: &'static [&'static str],
    pub command: &'static str,
}

pub struct TerminalCommands;

impl TerminalCommands {
    pub const NEW: Command = Command {
        id: "terminal:new",
        label: "New Terminal",
    };
}

/// Menu group holding "open" style file actions.
pub const FILE_OPEN_GROUP: &[&str] = &["menubar", "file", "open"];

/// Everything a shell registers for terminals.
pub fn commands() -> Vec<Command> {
    vec![TerminalCommands::NEW]
}

pub fn keybindings() -> Vec<Keybinding> {
    vec![Keybinding {
        command: TerminalCommands::NEW.id,
        keys: "ctrlcmd+`",
    }]
}

pub fn menus() -> Vec<MenuAction> {
    vec![MenuAction {
        menu_path: FILE_OPEN_GROUP,
        command: TerminalCommands::NEW.id,
    }]
}

/// Produces numbered terminal widgets sharing one backend and workspace.
pub struct TerminalFactory {
    backend: Arc<dyn TerminalBackend>,
    workspace: Arc<dyn WorkspaceRoot>,
    resize_debounce: Duration,
    next_number: AtomicUsize,
}

impl TerminalFactory {
    pub fn new(backend: Arc<dyn TerminalBackend>, workspace: Arc<dyn WorkspaceRoot>) -> Self {
        Self {
            backend,
            workspace,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            next_number: AtomicUsize::new(0),
        }
    }

    pub fn with_resize_debounce(mut self, delay: Duration) -> Self {
        self.resize_debounce = delay;
        self
    }

    /// Build the next inert widget: `terminal-<n>`, titled `Terminal <n>`.
    pub fn create_widget(
        &self,
        emulator: Arc<dyn TerminalEmulator>,
        geometry: TerminalGeometry,
    ) -> TerminalWidget {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let options = TerminalWidgetOptions::new(
            format!("terminal-{number}"),
            format!("Terminal {number}"),
        )
        .with_geometry(geometry)
        .with_resize_debounce(self.resize_debounce)
        .destroy_on_close(true);

        TerminalWidget::new(
            options,
            Arc::clone(&self.backend),
            Arc::clone(&self.workspace),
            emulator,
        )
    }

    /// Execute [`TerminalCommands::NEW`]: build a widget and start it.
    ///
    /// The widget is returned even when the server could not spawn a
    /// process; check its state.
    pub async fn new_terminal(
        &self,
        emulator: Arc<dyn TerminalEmulator>,
        geometry: TerminalGeometry,
    ) -> ClientResult<Arc<TerminalWidget>> {
        let widget = Arc::new(self.create_widget(emulator, geometry));
        widget.start().await?;
        info!(widget_id = %widget.id(), state = ?widget.state(), "New terminal opened");
        Ok(widget)
    }
}
