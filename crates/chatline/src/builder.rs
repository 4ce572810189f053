//! `ChatClientBuilder`: the composition-root entry point.
//!
//! Hosts describe where the backend lives and how the session should
//! behave, then build one [`ChatSession`] to share.

use chatline_session::{ChatSession, SessionConfig};
use chatline_transport::{Connector, Endpoint, WebSocketConnector};
use tracing::debug;

use crate::ChatlineError;

/// Where the builder takes the backend address from.
enum Target {
    /// Whatever `SessionConfig::endpoint` says.
    Config,
    /// An application origin; the chat endpoint is derived from it.
    Origin(String),
    /// A full `ws://` or `wss://` address.
    Endpoint(String),
}

/// Builder for a [`ChatSession`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use chatline::prelude::*;
///
/// # fn run() -> Result<(), ChatlineError> {
/// let session = ChatClientBuilder::new()
///     .origin("http://localhost:5173")
///     .session_config(SessionConfig {
///         handshake_timeout: Duration::from_secs(5),
///         ..SessionConfig::default()
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ChatClientBuilder {
    target: Target,
    session_config: SessionConfig,
}

impl ChatClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            target: Target::Config,
            session_config: SessionConfig::default(),
        }
    }

    /// Derives the endpoint from the application's origin: `https` becomes
    /// `wss`, `http` becomes `ws`, the path becomes `/ws`.
    pub fn origin(mut self, origin: &str) -> Self {
        self.target = Target::Origin(origin.to_string());
        self
    }

    /// Uses a full WebSocket address as-is. Whichever of this and
    /// [`origin`](Self::origin) is called last decides the address.
    pub fn endpoint(mut self, address: &str) -> Self {
        self.target = Target::Endpoint(address.to_string());
        self
    }

    /// Sets the session configuration. Its `endpoint` is used only when
    /// neither [`origin`](Self::origin) nor [`endpoint`](Self::endpoint)
    /// was given.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Builds a session over WebSockets. The session starts disconnected.
    ///
    /// # Errors
    /// Returns [`ChatlineError::Transport`] if the origin or endpoint is not
    /// a usable address.
    pub fn build(self) -> Result<ChatSession<WebSocketConnector>, ChatlineError> {
        self.build_with(WebSocketConnector)
    }

    /// Builds a session over a custom connector.
    pub fn build_with<C: Connector>(self, connector: C) -> Result<ChatSession<C>, ChatlineError> {
        let mut config = self.session_config;
        match self.target {
            Target::Config => {}
            Target::Origin(origin) => config.endpoint = Endpoint::from_origin(&origin)?,
            Target::Endpoint(address) => config.endpoint = Endpoint::parse(&address)?,
        }
        debug!(endpoint = %config.endpoint, "building chat session");
        Ok(ChatSession::new(connector, config))
    }
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
