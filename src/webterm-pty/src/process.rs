//! One PTY-backed child process and its I/O threads.

use std::io::{Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use portable_pty::{Child, ChildKiller, MasterPty, native_pty_system};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use webterm_protocol::{ProcessId, TerminalGeometry};

use crate::command::ShellCommand;
use crate::error::{PtyError, PtyResult};
use crate::pty_size;

/// Size of a single read from the PTY master.
const READ_BUFFER_SIZE: usize = 8192;

/// Output chunks buffered between the reader thread and the consumer.
/// A full buffer stalls the reader, which in turn stalls the child.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// How a terminal process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, when the platform reported one.
    pub code: Option<u32>,
    pub success: bool,
}

impl ExitInfo {
    fn unknown() -> Self {
        Self {
            code: None,
            success: false,
        }
    }
}

/// Byte chunks produced by the process (stdout and stderr combined).
///
/// Ends once the child has exited and the PTY is drained. There is exactly
/// one stream per process; see [`PtyProcess::take_output`].
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<Bytes>,
}

impl OutputStream {
    /// Next chunk, or `None` once the process output is exhausted.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Stream for OutputStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

/// An interactive child process attached to a pseudo-terminal.
pub struct PtyProcess {
    id: ProcessId,
    program: String,
    pid: Option<u32>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    input_tx: mpsc::UnboundedSender<Bytes>,
    output: Mutex<Option<OutputStream>>,
    geometry: Mutex<TerminalGeometry>,
    terminated: AtomicBool,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("id", &self.id)
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("geometry", &*self.geometry.lock())
            .field("live", &self.is_live())
            .finish()
    }
}

impl PtyProcess {
    /// Open a PTY of the given size and start `command` inside it.
    pub fn spawn(
        id: ProcessId,
        command: &ShellCommand,
        geometry: TerminalGeometry,
    ) -> PtyResult<Self> {
        let pair = native_pty_system()
            .openpty(pty_size(geometry))
            .map_err(|e| PtyError::Open {
                cols: geometry.cols(),
                rows: geometry.rows(),
                message: e.to_string(),
            })?;

        let spawn_error = |e: &dyn std::fmt::Display| PtyError::Spawn {
            program: command.program().to_string(),
            message: e.to_string(),
        };

        let child = pair
            .slave
            .spawn_command(command.to_builder())
            .map_err(|e| spawn_error(&e))?;
        // The slave end must close in this process, otherwise the reader
        // never sees EOF after the child exits.
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(|e| spawn_error(&e))?;
        let writer = pair.master.take_writer().map_err(|e| spawn_error(&e))?;
        let killer = child.clone_killer();
        let pid = child.process_id();

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        spawn_reader(&id, reader, output_tx)?;
        spawn_writer(&id, writer, input_rx)?;
        spawn_waiter(&id, child, exit_tx)?;

        info!(
            terminal_id = %id,
            pid = ?pid,
            program = %command.program(),
            cols = geometry.cols(),
            rows = geometry.rows(),
            "Spawned terminal process"
        );

        Ok(Self {
            id,
            program: command.program().to_string(),
            pid,
            master: Mutex::new(pair.master),
            killer: Mutex::new(killer),
            input_tx,
            output: Mutex::new(Some(OutputStream { rx: output_rx })),
            geometry: Mutex::new(geometry),
            terminated: AtomicBool::new(false),
            exit_rx,
        })
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    /// OS process id of the child, when the platform exposes one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn geometry(&self) -> TerminalGeometry {
        *self.geometry.lock()
    }

    /// Whether the child is still running.
    pub fn is_live(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    /// Exit status, once the child has exited.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// Queue raw bytes for the child's input.
    ///
    /// Input sent after the child has exited is dropped.
    pub fn write(&self, data: impl Into<Bytes>) {
        let data = data.into();
        if data.is_empty() {
            return;
        }
        if self.input_tx.send(data).is_err() {
            debug!(terminal_id = %self.id, "Dropping input for exited terminal");
        }
    }

    /// Change the PTY window size. A no-op once the child has exited.
    pub fn resize(&self, geometry: TerminalGeometry) -> PtyResult<()> {
        if !self.is_live() {
            debug!(terminal_id = %self.id, "Ignoring resize of exited terminal");
            return Ok(());
        }

        self.master
            .lock()
            .resize(pty_size(geometry))
            .map_err(|e| PtyError::Resize(e.to_string()))?;
        *self.geometry.lock() = geometry;

        debug!(
            terminal_id = %self.id,
            cols = geometry.cols(),
            rows = geometry.rows(),
            "Resized terminal"
        );
        Ok(())
    }

    /// Hand out the output stream. Returns `None` if it was already taken.
    pub fn take_output(&self) -> Option<OutputStream> {
        self.output.lock().take()
    }

    /// Send the child a termination signal.
    ///
    /// Returns `true` if this call delivered the signal; repeated calls and
    /// calls after the child exited do nothing.
    pub fn terminate(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        if self.terminated.swap(true, Ordering::SeqCst) {
            return false;
        }

        match self.killer.lock().kill() {
            Ok(()) => {
                info!(terminal_id = %self.id, pid = ?self.pid, "Terminated terminal process");
                true
            }
            Err(e) => {
                // Raced with a natural exit.
                debug!(terminal_id = %self.id, error = %e, "Kill failed");
                false
            }
        }
    }

    /// Resolve when the child exits.
    pub async fn wait_exit(&self) -> ExitInfo {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(info) => (*info).unwrap_or_else(ExitInfo::unknown),
            Err(_) => ExitInfo::unknown(),
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn spawn_reader(
    id: &ProcessId,
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<Bytes>,
) -> PtyResult<()> {
    let id = id.clone();
    thread::Builder::new()
        .name(format!("pty-reader-{id}"))
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            // Output stream dropped; nobody is listening any more.
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    // Linux reports EIO once the slave side is gone.
                    Err(e) => {
                        debug!(terminal_id = %id, error = %e, "PTY read ended");
                        break;
                    }
                }
            }
            debug!(terminal_id = %id, "PTY reader finished");
        })?;
    Ok(())
}

fn spawn_writer(
    id: &ProcessId,
    mut writer: Box<dyn Write + Send>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) -> PtyResult<()> {
    let id = id.clone();
    thread::Builder::new()
        .name(format!("pty-writer-{id}"))
        .spawn(move || {
            while let Some(data) = rx.blocking_recv() {
                if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
                    debug!(terminal_id = %id, error = %e, "PTY write failed, dropping input");
                    break;
                }
            }
        })?;
    Ok(())
}

fn spawn_waiter(
    id: &ProcessId,
    mut child: Box<dyn Child + Send + Sync>,
    tx: watch::Sender<Option<ExitInfo>>,
) -> PtyResult<()> {
    let id = id.clone();
    thread::Builder::new()
        .name(format!("pty-waiter-{id}"))
        .spawn(move || {
            let info = match child.wait() {
                Ok(status) => ExitInfo {
                    code: Some(status.exit_code()),
                    success: status.success(),
                },
                Err(e) => {
                    warn!(terminal_id = %id, error = %e, "Failed to wait for terminal process");
                    ExitInfo::unknown()
                }
            };
            info!(terminal_id = %id, code = ?info.code, "Terminal process exited");
            tx.send_replace(Some(info));
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn sh(script: &str) -> ShellCommand {
        ShellCommand::new("/bin/sh").arg("-c").arg(script)
    }

    async fn collect_output(mut output: OutputStream) -> String {
        let mut collected = Vec::new();
        while let Some(chunk) = output.recv().await {
            collected.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&collected).into_owned()
    }

    #[tokio::test]
    async fn test_output_and_exit() {
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("printf 'hello from pty'"),
            TerminalGeometry::default(),
        )
        .expect("spawn");

        let output = process.take_output().expect("first take");
        let text = tokio::time::timeout(TIMEOUT, collect_output(output))
            .await
            .expect("output should end after exit");
        assert!(text.contains("hello from pty"), "unexpected output: {text:?}");

        let exit = tokio::time::timeout(TIMEOUT, process.wait_exit())
            .await
            .expect("exit");
        assert_eq!(exit.code, Some(0));
        assert!(exit.success);
        assert!(!process.is_live());
    }

    #[tokio::test]
    async fn test_output_taken_once() {
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("true"),
            TerminalGeometry::default(),
        )
        .expect("spawn");
        assert!(process.take_output().is_some());
        assert!(process.take_output().is_none());
    }

    #[tokio::test]
    async fn test_write_reaches_child() {
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("read line; printf 'got:%s' \"$line\""),
            TerminalGeometry::default(),
        )
        .expect("spawn");
        let output = process.take_output().expect("output");

        process.write(&b"ping\r"[..]);

        let text = tokio::time::timeout(TIMEOUT, collect_output(output))
            .await
            .expect("output should end after exit");
        assert!(text.contains("got:ping"), "unexpected output: {text:?}");
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let result = PtyProcess::spawn(
            ProcessId::generate(),
            &ShellCommand::new("/definitely/not/a/shell"),
            TerminalGeometry::default(),
        );
        assert!(matches!(result, Err(PtyError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("sleep 30"),
            TerminalGeometry::default(),
        )
        .expect("spawn");
        assert!(process.is_live());

        assert!(process.terminate());
        assert!(!process.terminate());

        tokio::time::timeout(TIMEOUT, process.wait_exit())
            .await
            .expect("terminated process should exit");
        assert!(!process.is_live());
        assert!(!process.terminate());
    }

    #[tokio::test]
    async fn test_resize_updates_geometry_and_is_noop_after_exit() {
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("sleep 30"),
            TerminalGeometry::new(80, 24).unwrap(),
        )
        .expect("spawn");

        let bigger = TerminalGeometry::new(120, 40).unwrap();
        process.resize(bigger).expect("resize");
        assert_eq!(process.geometry(), bigger);

        process.terminate();
        tokio::time::timeout(TIMEOUT, process.wait_exit())
            .await
            .expect("exit");

        process
            .resize(TerminalGeometry::new(10, 10).unwrap())
            .expect("resize after exit is a no-op");
        assert_eq!(process.geometry(), bigger);
    }

    #[tokio::test]
    async fn test_spawn_in_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let canonical = dir.path().canonicalize().expect("canonicalize");
        let process = PtyProcess::spawn(
            ProcessId::generate(),
            &sh("pwd").cwd(&canonical),
            TerminalGeometry::default(),
        )
        .expect("spawn");

        let text = tokio::time::timeout(
            TIMEOUT,
            collect_output(process.take_output().expect("output")),
        )
        .await
        .expect("output");
        assert!(
            text.contains(&*canonical.to_string_lossy()),
            "unexpected output: {text:?}"
        );
    }
}
