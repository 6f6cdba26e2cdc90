//! Server configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webterm_pty::ShellCommand;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:55580").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Terminal process configuration.
    #[serde(default)]
    pub terminal: TerminalConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// CORS origins (empty = allow all).
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_listen_addr() -> String {
    "127.0.0.1:55580".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            terminal: TerminalConfig::default(),
            logging: LoggingConfig::default(),
            cors_origins: vec![],
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("WEBTERM_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(shell) = std::env::var("WEBTERM_SHELL") {
            config.terminal.shell = Some(shell);
        }

        if let Ok(cwd) = std::env::var("WEBTERM_DEFAULT_CWD") {
            config.terminal.default_cwd = Some(PathBuf::from(cwd));
        }

        if let Ok(max) = std::env::var("WEBTERM_MAX_TERMINALS") {
            config.terminal.max_terminals = max
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid WEBTERM_MAX_TERMINALS '{max}': {e}"))?;
        }

        Ok(config)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

/// How terminal processes are started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Shell executable. Defaults to the platform shell (`$SHELL`).
    #[serde(default)]
    pub shell: Option<String>,

    /// Arguments passed to the shell.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for every terminal.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory used when the client sends no usable workspace root.
    /// Defaults to the server's current directory.
    #[serde(default)]
    pub default_cwd: Option<PathBuf>,

    /// Maximum number of live terminals. Creates beyond this fail like a
    /// spawn failure.
    #[serde(default = "default_max_terminals")]
    pub max_terminals: usize,
}

fn default_max_terminals() -> usize {
    64
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: None,
            args: vec![],
            env: BTreeMap::new(),
            default_cwd: None,
            max_terminals: default_max_terminals(),
        }
    }
}

impl TerminalConfig {
    /// Build the command for a new terminal in `cwd`.
    pub fn shell_command(&self, cwd: Option<PathBuf>) -> ShellCommand {
        let mut command = match &self.shell {
            Some(shell) => ShellCommand::new(shell.clone()),
            None => ShellCommand::default_shell(),
        }
        .args(self.args.iter().cloned());

        for (key, value) in &self.env {
            command = command.env(key.clone(), value.clone());
        }

        match cwd.or_else(|| self.default_cwd.clone()) {
            Some(cwd) => command.cwd(cwd),
            None => command,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json or pretty).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:55580");
        assert_eq!(config.terminal.max_terminals, 64);
        assert!(config.terminal.shell.is_none());
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_config_serialization() {
        let config = ServerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.listen_addr, parsed.listen_addr);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: ServerConfig =
            serde_json::from_str(r#"{"terminal": {"shell": "/bin/sh", "max_terminals": 2}}"#)
                .unwrap();
        assert_eq!(parsed.listen_addr, "127.0.0.1:55580");
        assert_eq!(parsed.terminal.shell.as_deref(), Some("/bin/sh"));
        assert_eq!(parsed.terminal.max_terminals, 2);
    }

    #[test]
    fn test_shell_command_prefers_request_cwd() {
        let config = TerminalConfig {
            shell: Some("/bin/sh".to_string()),
            args: vec!["-l".to_string()],
            default_cwd: Some(PathBuf::from("/var")),
            ..Default::default()
        };

        let command = config.shell_command(Some(PathBuf::from("/tmp")));
        assert_eq!(command.program(), "/bin/sh");
        assert_eq!(command.working_dir(), Some(Path::new("/tmp")));

        let command = config.shell_command(None);
        assert_eq!(command.working_dir(), Some(Path::new("/var")));
    }
}
