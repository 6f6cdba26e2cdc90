//! webterm console host: attach the local terminal to a remote shell.

use std::fs::File;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use webterm_client::{
    DEFAULT_ENDPOINT, Endpoint, FixedWorkspaceRoot, HttpTerminalBackend, TerminalEmulator,
    TerminalFactory, WidgetState,
};
use webterm_protocol::TerminalGeometry;

/// Ctrl+] detaches, as in telnet.
const DETACH_BYTE: u8 = 0x1d;

/// Attach this terminal to a shell on a webterm server
#[derive(Parser)]
#[command(name = "webterm")]
#[command(about = "Attach the local terminal to a shell on a webterm server (Ctrl+] detaches)")]
#[command(version)]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = DEFAULT_ENDPOINT, env = "WEBTERM_SERVER")]
    server: String,

    /// Workspace root the shell starts in (defaults to the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn setup_logging(path: &Path, level: &str) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

/// Renders process output by writing it straight to stdout.
struct StdoutEmulator;

impl TerminalEmulator for StdoutEmulator {
    fn write(&self, data: &[u8]) {
        let mut out = stdout().lock();
        if let Err(e) = out.write_all(data).and_then(|()| out.flush()) {
            warn!(error = %e, "Failed to write to stdout");
        }
    }
}

/// Raw mode for the lifetime of the guard.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnableBracketedPaste)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableBracketedPaste);
        let _ = disable_raw_mode();
    }
}

/// Bytes a VT-style terminal sends for a key press.
fn key_to_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let bytes: Vec<u8> = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let control = match c {
                'a'..='z' => c as u8 - b'a' + 1,
                'A'..='Z' => c as u8 - b'A' + 1,
                '@' | ' ' | '2' => 0,
                '[' | '3' => 0x1b,
                '\\' | '4' => 0x1c,
                ']' | '5' => 0x1d,
                '^' | '6' => 0x1e,
                '_' | '7' => 0x1f,
                _ => return None,
            };
            vec![control]
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf).as_bytes();
            if key.modifiers.contains(KeyModifiers::ALT) {
                [&[0x1b_u8][..], encoded].concat()
            } else {
                encoded.to_vec()
            }
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::F(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => return None,
        },
        _ => return None,
    };
    Some(bytes)
}

fn viewport() -> TerminalGeometry {
    crossterm::terminal::size()
        .ok()
        .and_then(|(cols, rows)| TerminalGeometry::new(cols, rows).ok())
        .unwrap_or_default()
}

fn workspace_uri(root: Option<PathBuf>) -> Result<Option<String>> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Workspace root {} does not exist", root.display()))?;
    Ok(Url::from_directory_path(&root).ok().map(String::from))
}

async fn run(args: Args) -> Result<ExitCode> {
    let endpoint = Endpoint::parse(&args.server)
        .with_context(|| format!("Invalid server address {}", args.server))?;
    let backend = Arc::new(HttpTerminalBackend::new(endpoint)?);
    let workspace = Arc::new(FixedWorkspaceRoot(workspace_uri(args.root)?));
    let factory = TerminalFactory::new(backend, workspace);

    let widget = factory
        .new_terminal(Arc::new(StdoutEmulator), viewport())
        .await
        .with_context(|| format!("Failed to open a terminal on {}", args.server))?;
    if widget.state() == WidgetState::Failed {
        anyhow::bail!("The server could not start a shell, see the server log for details");
    }
    info!(widget_id = %widget.id(), process_id = ?widget.process_id(), "Attached");

    let _raw = RawModeGuard::enable()?;
    let mut events = EventStream::new();

    loop {
        tokio::select! {
            _ = widget.closed() => break,
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    if let Some(bytes) = key_to_bytes(key) {
                        if bytes == [DETACH_BYTE] {
                            info!("Detached by user");
                            break;
                        }
                        widget.send_input(bytes);
                    }
                }
                Some(Ok(Event::Paste(text))) => widget.send_input(text.into_bytes()),
                Some(Ok(Event::Resize(cols, rows))) => {
                    if let Ok(geometry) = TerminalGeometry::new(cols, rows) {
                        widget.on_viewport_resize(geometry);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to read terminal events");
                    break;
                }
                None => break,
            },
        }
    }

    widget.dispose();
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match &args.log_file {
        Some(path) => match setup_logging(path, &args.log_level) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("{e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("webterm: {e:#}");
            ExitCode::FAILURE
        }
    }
}
