//! Backend address derivation.
//!
//! The chat backend always lives on the same origin as the page that hosts
//! the client, under a fixed path. An `https` origin maps to `wss`, `http`
//! maps to `ws`.

use std::fmt;

use url::Url;

use crate::TransportError;

/// A validated `ws://` or `wss://` address of the chat backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Path suffix appended to the origin.
    pub const PATH: &'static str = "/ws";

    /// Derives the endpoint from a page origin such as
    /// `https://events.example.com` or `http://localhost:3000`.
    ///
    /// Any path, query or fragment on the origin is discarded.
    pub fn from_origin(origin: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(origin)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{origin}: {e}")))?;

        let scheme = match parsed.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported origin scheme `{other}`"
                )));
            }
        };

        let host = parsed.host_str().ok_or_else(|| {
            TransportError::InvalidEndpoint(format!("{origin}: missing host"))
        })?;

        let address = match parsed.port() {
            Some(port) => format!("{scheme}://{host}:{port}{}", Self::PATH),
            None => format!("{scheme}://{host}{}", Self::PATH),
        };

        Self::parse(&address)
    }

    /// Parses a full WebSocket address. Only `ws` and `wss` are accepted.
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let url = Url::parse(address)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{address}: {e}")))?;
        match url.scheme() {
            "ws" | "wss" if url.has_host() => Ok(Self(url)),
            "ws" | "wss" => Err(TransportError::InvalidEndpoint(format!(
                "{address}: missing host"
            ))),
            other => Err(TransportError::InvalidEndpoint(format!(
                "unsupported endpoint scheme `{other}`"
            ))),
        }
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the endpoint uses TLS (`wss`).
    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "wss"
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::parse("ws://localhost/ws").expect("static endpoint is valid")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
