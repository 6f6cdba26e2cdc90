//! Transport to the terminal server.
//!
//! [`TerminalBackend`] is the seam between the widget and the network:
//! [`HttpTerminalBackend`] speaks the real HTTP/WebSocket protocol, tests
//! plug in their own implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use webterm_protocol::routes::{TERMINALS_PATH, size_path, terminal_path};
use webterm_protocol::{
    CreateOutcome, CreateTerminalRequest, GeometryQuery, ProcessId, TerminalGeometry,
};

use crate::endpoint::Endpoint;
use crate::error::{ClientError, ClientResult};

/// Output chunks buffered between the socket and the widget.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Operations the widget needs from a terminal server.
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    /// Ask for a new terminal of `geometry` opened on the workspace root `root_uri`.
    async fn create(
        &self,
        root_uri: Option<&str>,
        geometry: TerminalGeometry,
    ) -> ClientResult<CreateOutcome>;

    /// Propagate a new geometry. Unknown ids are not an error.
    async fn resize(&self, id: &ProcessId, geometry: TerminalGeometry) -> ClientResult<()>;

    /// Terminate a terminal the widget will never attach to.
    async fn release(&self, id: &ProcessId) -> ClientResult<()>;

    /// Attach to a terminal's I/O stream.
    async fn connect(&self, id: &ProcessId) -> ClientResult<TerminalConnection>;
}

/// The widget's side of an attached terminal stream.
///
/// Dropping `input` closes the stream. `output` yields `None` once the
/// server closed the stream or the connection failed.
#[derive(Debug)]
pub struct TerminalConnection {
    pub input: mpsc::UnboundedSender<Bytes>,
    pub output: mpsc::Receiver<Bytes>,
}

/// The transport's side of a [`TerminalConnection`].
#[derive(Debug)]
pub struct ConnectionRemote {
    pub input: mpsc::UnboundedReceiver<Bytes>,
    pub output: mpsc::Sender<Bytes>,
}

impl TerminalConnection {
    /// A connected pair of channel ends.
    pub fn channel() -> (TerminalConnection, ConnectionRemote) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        (
            TerminalConnection {
                input: input_tx,
                output: output_rx,
            },
            ConnectionRemote {
                input: input_rx,
                output: output_tx,
            },
        )
    }
}

/// [`TerminalBackend`] over HTTP and WebSocket.
#[derive(Debug, Clone)]
pub struct HttpTerminalBackend {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl HttpTerminalBackend {
    pub fn new(endpoint: Endpoint) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Turn a non-success response into [`ClientError::Status`].
async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TerminalBackend for HttpTerminalBackend {
    async fn create(
        &self,
        root_uri: Option<&str>,
        geometry: TerminalGeometry,
    ) -> ClientResult<CreateOutcome> {
        let request = CreateTerminalRequest {
            uri: root_uri.map(str::to_string),
        };
        let response = self
            .client
            .post(self.endpoint.rest_url(TERMINALS_PATH))
            .query(&GeometryQuery::from_geometry(geometry))
            .json(&request)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        Ok(CreateOutcome::from_body(&body)?)
    }

    async fn resize(&self, id: &ProcessId, geometry: TerminalGeometry) -> ClientResult<()> {
        let response = self
            .client
            .post(self.endpoint.rest_url(&size_path(id)))
            .query(&GeometryQuery::from_geometry(geometry))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn release(&self, id: &ProcessId) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.endpoint.rest_url(&terminal_path(id)))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn connect(&self, id: &ProcessId) -> ClientResult<TerminalConnection> {
        let url = self.endpoint.websocket_url(&terminal_path(id))?;
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        info!(terminal_id = %id, "Terminal stream opened");

        let (connection, remote) = TerminalConnection::channel();
        let ConnectionRemote {
            input: mut input_rx,
            output: output_tx,
        } = remote;

        // Write task: forwards input until the widget drops its sender, then closes.
        let write_id = id.clone();
        tokio::spawn(async move {
            while let Some(data) = input_rx.recv().await {
                if let Err(e) = write.send(WsMessage::Binary(data.to_vec())).await {
                    debug!(terminal_id = %write_id, error = %e, "Failed to send input");
                    return;
                }
            }
            let _ = write.send(WsMessage::Close(None)).await;
        });

        // Read task: dropping `output_tx` on exit tells the widget the stream ended.
        let read_id = id.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let chunk = match msg {
                    Ok(WsMessage::Binary(data)) => Bytes::from(data),
                    Ok(WsMessage::Text(text)) => Bytes::from(text),
                    Ok(WsMessage::Close(_)) => {
                        info!(terminal_id = %read_id, "Terminal stream closed by server");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(terminal_id = %read_id, error = %e, "Terminal stream failed");
                        break;
                    }
                };
                if output_tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_channel_pairs_ends() {
        let (mut connection, mut remote) = TerminalConnection::channel();

        connection.input.send(Bytes::from_static(b"ls\r")).unwrap();
        assert_eq!(remote.input.recv().await.unwrap(), Bytes::from_static(b"ls\r"));

        remote.output.send(Bytes::from_static(b"file\r\n")).await.unwrap();
        assert_eq!(
            connection.output.recv().await.unwrap(),
            Bytes::from_static(b"file\r\n")
        );

        drop(remote);
        assert!(connection.output.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_create_against_unreachable_server_is_http_error() {
        // Port 9 (discard) is never served in test environments.
        let backend =
            HttpTerminalBackend::new(Endpoint::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let result = backend.create(None, TerminalGeometry::default()).await;
        assert!(matches!(result, Err(ClientError::Http(_))));
    }
}
