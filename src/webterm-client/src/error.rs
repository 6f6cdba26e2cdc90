//! Error types for the terminal client.

use thiserror::Error;
use webterm_protocol::ProtocolError;

use crate::widget::WidgetState;

/// Errors that can occur while talking to the terminal server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Endpoint URL could not be parsed or has an unsupported scheme.
    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server's answer did not follow the protocol.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The widget cannot perform the operation in its current state.
    #[error("Operation not allowed while the terminal is {0:?}")]
    InvalidState(WidgetState),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ClientError::Http(format!("Connection failed: {}", err))
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Endpoint(err.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
