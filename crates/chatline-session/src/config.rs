//! Session configuration.

use std::time::Duration;

use chatline_transport::{Endpoint, TransportError};
use tracing::warn;

/// What a handshake does when its window lapses without completion or
/// a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Resolve with [`HandshakeOutcome::Unconfirmed`](crate::HandshakeOutcome::Unconfirmed)
    /// so the host can proceed without confirmed history.
    #[default]
    Proceed,
    /// Fail with [`SessionError::HandshakeTimeout`](crate::SessionError::HandshakeTimeout).
    Fail,
}

/// Whether the session re-runs the handshake for joined conversations
/// after it recovers from a lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejoinPolicy {
    /// The host re-initializes conversations itself.
    #[default]
    Manual,
    /// Every conversation joined through this session (and not left) is
    /// re-initialized in the background once a reconnection opens.
    Automatic,
}

/// Configuration for a [`ChatSession`](crate::ChatSession).
///
/// Construct with `Default` and override fields with struct-update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use chatline_session::SessionConfig;
///
/// let config = SessionConfig {
///     max_reconnect_attempts: 3,
///     handshake_timeout: Duration::from_secs(5),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.history_page_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend address.
    pub endpoint: Endpoint,

    /// Reconnection attempts scheduled after a loss before giving up.
    /// Default: 5.
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnection attempt; doubles per attempt.
    /// Default: 1 s.
    pub base_backoff: Duration,

    /// Upper bound on any single reconnection delay. Default: 10 s.
    pub max_backoff: Duration,

    /// Window for the whole authenticate → join → load-history sequence.
    /// Default: 10 s.
    pub handshake_timeout: Duration,

    /// Messages requested by the handshake's history load. Default: 50.
    pub history_page_size: u32,

    /// How often [`TypingIndicator`](crate::TypingIndicator) re-announces
    /// an ongoing typing state. Default: 2 s.
    pub typing_interval: Duration,

    /// Handshake timeout behavior.
    pub timeout_policy: TimeoutPolicy,

    /// Behavior after reconnection.
    pub rejoin_policy: RejoinPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            max_reconnect_attempts: 5,
            base_backoff: Duration::from_millis(1_000),
            max_backoff: Duration::from_millis(10_000),
            handshake_timeout: Duration::from_secs(10),
            history_page_size: 50,
            typing_interval: Duration::from_secs(2),
            timeout_policy: TimeoutPolicy::default(),
            rejoin_policy: RejoinPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Default configuration pointed at the backend of a page origin
    /// (`https://host` → `wss://host/ws`).
    pub fn for_origin(origin: &str) -> Result<Self, TransportError> {
        Ok(Self {
            endpoint: Endpoint::from_origin(origin)?,
            ..Self::default()
        })
    }

    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`ChatSession::new`](crate::ChatSession::new). Rules:
    /// - zero `base_backoff` becomes 1 ms.
    /// - `max_backoff` is raised to at least `base_backoff`.
    /// - zero `handshake_timeout` and `typing_interval` fall back to defaults.
    /// - `history_page_size` is at least 1.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.base_backoff.is_zero() {
            warn!("base_backoff is zero, using 1ms");
            self.base_backoff = Duration::from_millis(1);
        }
        if self.max_backoff < self.base_backoff {
            warn!(
                max_ms = self.max_backoff.as_millis() as u64,
                base_ms = self.base_backoff.as_millis() as u64,
                "max_backoff below base_backoff, raising it"
            );
            self.max_backoff = self.base_backoff;
        }
        if self.handshake_timeout.is_zero() {
            warn!("handshake_timeout is zero, using default");
            self.handshake_timeout = defaults.handshake_timeout;
        }
        if self.typing_interval.is_zero() {
            self.typing_interval = defaults.typing_interval;
        }
        if self.history_page_size == 0 {
            warn!("history_page_size is zero, using 1");
            self.history_page_size = 1;
        }
        self
    }
}
