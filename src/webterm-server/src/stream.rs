//! WebSocket stream carrying a terminal's raw I/O.
//!
//! Inbound frames (binary or text) are written to the process verbatim;
//! process output goes out as binary frames in the order it was read. The
//! connection owns the terminal: when either side goes away the terminal is
//! released.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use bytes::Bytes;
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tracing::{debug, info, warn};
use webterm_protocol::ProcessId;
use webterm_pty::{OutputStream, PtyProcess};

use crate::error::{AppError, AppResult};
use crate::registry::TerminalRegistry;
use crate::state::AppState;

/// Attach a WebSocket to a terminal.
///
/// Refused before the upgrade when the id is unknown (404) or another
/// connection already holds the output (409).
pub async fn terminal_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
) -> AppResult<Response> {
    let process = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Terminal not found: {id}")))?;
    let output = process
        .take_output()
        .ok_or_else(|| AppError::Conflict(format!("Terminal {id} is already attached")))?;

    let registry = Arc::clone(&state.registry);
    let failed_registry = Arc::clone(&state.registry);
    let failed_id = id.clone();

    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(terminal_id = %failed_id, error = %e, "WebSocket upgrade failed");
            tokio::spawn(async move {
                failed_registry.release(&failed_id).await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, registry, process, output)))
}

/// Which side ended the connection.
#[derive(Debug)]
enum Ended {
    ProcessExited,
    ClientGone,
}

async fn handle_socket(
    socket: WebSocket,
    registry: Arc<TerminalRegistry>,
    process: Arc<PtyProcess>,
    output: OutputStream,
) {
    let id = process.id().clone();
    info!(terminal_id = %id, "Terminal stream connected");

    let (sender, receiver) = socket.split();

    let send_id = id.clone();
    let mut send_task = tokio::spawn(async move { pump_output(sender, output, send_id).await });
    let mut recv_task = tokio::spawn(async move { pump_input(receiver, process).await });

    let ended = tokio::select! {
        result = &mut send_task => {
            recv_task.abort();
            result.unwrap_or(Ended::ClientGone)
        }
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or(Ended::ClientGone)
        }
    };

    registry.release(&id).await;
    info!(terminal_id = %id, ended = ?ended, "Terminal stream closed");
}

/// Forward process output until it ends, then close the socket.
async fn pump_output(
    mut sender: SplitSink<WebSocket, Message>,
    mut output: OutputStream,
    id: ProcessId,
) -> Ended {
    while let Some(chunk) = output.recv().await {
        if let Err(e) = sender.send(Message::Binary(chunk)).await {
            debug!(terminal_id = %id, error = %e, "Failed to send output");
            return Ended::ClientGone;
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "process exited".into(),
    }));
    if let Err(e) = sender.send(close).await {
        debug!(terminal_id = %id, error = %e, "Failed to send close frame");
    }
    Ended::ProcessExited
}

/// Forward client frames to the process until the client closes.
async fn pump_input(mut receiver: SplitStream<WebSocket>, process: Arc<PtyProcess>) -> Ended {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => process.write(data),
            Ok(Message::Text(text)) => {
                process.write(Bytes::copy_from_slice(text.as_str().as_bytes()));
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(terminal_id = %process.id(), error = %e, "WebSocket receive error");
                break;
            }
        }
    }
    Ended::ClientGone
}
