//! Unified error type for Chatline.

use chatline_protocol::ProtocolError;
use chatline_session::SessionError;
use chatline_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// With the `chatline` facade a host deals with this single type instead
/// of importing errors from each layer; `?` converts them automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatlineError {
    /// Endpoint or socket failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Conversation initialization failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
