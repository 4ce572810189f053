//! Error types for the session layer.

use chatline_protocol::EventId;
use chatline_transport::TransportError;

/// Errors the session reports to its host.
///
/// Fire-and-forget operations never produce these; they answer with a
/// plain `bool`. Only conversation initialization (the handshake) and
/// configuration can fail with a `SessionError`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration could not be turned into a usable endpoint.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered the handshake with a protocol-error frame.
    /// `reason` is the server-supplied message.
    #[error("joining {event_id} rejected: {reason}")]
    Rejected { event_id: EventId, reason: String },

    /// No completion within the handshake window, and the session is
    /// configured to treat that as a failure.
    #[error("joining {0} timed out")]
    HandshakeTimeout(EventId),

    /// The handshake lost its listener scope before finishing.
    #[error("joining {0} interrupted")]
    Interrupted(EventId),
}
