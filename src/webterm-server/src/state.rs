//! Application state.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::registry::TerminalRegistry;

/// Application state shared by all handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Live terminals.
    pub registry: Arc<TerminalRegistry>,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(TerminalRegistry::new(config.terminal.clone()));
        Self {
            config,
            registry,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
