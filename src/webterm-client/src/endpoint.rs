//! Server endpoint addressing.

use std::fmt;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Address used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:55580";

/// Base address of a terminal server.
///
/// One base yields both REST URLs (`http`/`https`) and WebSocket URLs
/// (`ws`/`wss`) for the same paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse a base address. Accepts `http`, `https`, `ws` and `wss`.
    pub fn parse(base: &str) -> ClientResult<Self> {
        let url = Url::parse(base)?;
        Self::from_url(url)
    }

    pub fn from_url(mut url: Url) -> ClientResult<Self> {
        let http_scheme = match url.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(ClientError::Endpoint(format!("unsupported scheme `{other}`")));
            }
        };
        url.set_scheme(http_scheme)
            .map_err(|()| ClientError::Endpoint(format!("cannot use scheme {http_scheme}")))?;
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { base: url })
    }

    /// REST URL of `path`, resolved below the base path.
    pub fn rest_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let base_path = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{base_path}/{}", path.trim_start_matches('/')));
        url
    }

    /// WebSocket URL of `path`: the REST URL with `ws`/`wss` as scheme.
    pub fn websocket_url(&self, path: &str) -> ClientResult<Url> {
        let mut url = self.rest_url(path);
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Endpoint(format!("cannot use scheme {scheme}")))?;
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.base, f)
    }
}
