//! Description of the program a terminal runs.

use std::path::{Path, PathBuf};

use portable_pty::CommandBuilder;

/// Program, arguments, working directory and extra environment for a
/// terminal's child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// The platform's interactive shell (see [`crate::default_shell`]).
    pub fn default_shell() -> Self {
        Self::new(crate::default_shell())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub(crate) fn to_builder(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.program);
        builder.args(&self.args);
        if let Some(cwd) = &self.cwd {
            builder.cwd(cwd);
        }

        builder.env("TERM", "xterm-256color");
        builder.env("COLORTERM", "truecolor");
        for (key, value) in &self.env {
            builder.env(key, value);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let cmd = ShellCommand::new("/bin/sh")
            .arg("-c")
            .arg("true")
            .cwd("/tmp")
            .env("FOO", "bar");
        assert_eq!(cmd.program(), "/bin/sh");
        assert_eq!(cmd.working_dir(), Some(Path::new("/tmp")));

        let builder = cmd.to_builder();
        let argv: Vec<String> = builder
            .get_argv()
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["/bin/sh", "-c", "true"]);
        assert_eq!(
            builder.get_env("FOO").map(|v| v.to_string_lossy().into_owned()),
            Some("bar".to_string())
        );
        assert_eq!(
            builder.get_env("TERM").map(|v| v.to_string_lossy().into_owned()),
            Some("xterm-256color".to_string())
        );
    }
}
