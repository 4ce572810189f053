//! Frame types for the Chatline wire format.
//!
//! Every type here travels "on the wire": it is serialized by the client,
//! sent over the transport, and deserialized by the backend (or the other
//! way around). Field names follow the backend's camelCase JSON, frame
//! tags are snake_case:
//!
//! ```text
//! {"type":"join_event","eventId":7}
//! {"type":"messages_loaded","eventId":7,"messages":[...]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of an event (venue listing) and therefore of its chat
/// conversation. One event has exactly one conversation.
///
/// `#[serde(transparent)]` makes an `EventId(7)` serialize as plain `7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// Identifier of a chat participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A participant as the backend describes it in typing frames, and as the
/// client identifies itself when authenticating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    /// Stable user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
}

impl ChatUser {
    /// Convenience constructor.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One chat message as stored and relayed by the backend.
///
/// Only `content` is required. The backend adds the rest as it persists
/// the message, so everything else tolerates being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Backend-assigned message id.
    #[serde(default)]
    pub id: Option<u64>,
    /// Author id.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Author display name at the time of sending.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Message text.
    pub content: String,
    /// Creation timestamp as formatted by the backend.
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// ClientFrame: client → backend
// ---------------------------------------------------------------------------

/// Frames the client sends.
///
/// `tag = "type"` produces internally tagged JSON (`{"type":"auth",...}`).
/// `rename_all_fields` applies camelCase to the fields of every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Handshake step 1: identify the caller.
    Auth { user_id: UserId, user_name: String },

    /// Handshake step 2: enter an event's conversation.
    JoinEvent { event_id: EventId },

    /// Handshake step 3: request a page of history.
    LoadMessages {
        event_id: EventId,
        limit: u32,
        offset: u32,
    },

    /// Post a message. Fire-and-forget; any confirmation arrives as a
    /// [`ServerFrame::NewMessage`].
    SendMessage { event_id: EventId, content: String },

    /// Presence signal: the caller started or stopped typing.
    Typing { event_id: EventId, is_typing: bool },

    /// Leave an event's conversation.
    LeaveEvent { event_id: EventId },
}

impl ClientFrame {
    /// Builds the authenticate frame for `user`.
    pub fn auth(user: &ChatUser) -> Self {
        Self::Auth {
            user_id: user.id,
            user_name: user.name.clone(),
        }
    }

    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::JoinEvent { .. } => "join_event",
            Self::LoadMessages { .. } => "load_messages",
            Self::SendMessage { .. } => "send_message",
            Self::Typing { .. } => "typing",
            Self::LeaveEvent { .. } => "leave_event",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerFrame: backend → client
// ---------------------------------------------------------------------------

/// Frames the backend sends.
///
/// Tags the client does not know decode to [`ServerFrame::Unrecognized`]
/// rather than failing, so a newer backend does not look like a broken one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Ack of [`ClientFrame::Auth`].
    AuthSuccess,

    /// Ack of [`ClientFrame::JoinEvent`].
    JoinedEvent { event_id: EventId },

    /// Ack of [`ClientFrame::LoadMessages`]; ends the handshake.
    MessagesLoaded {
        event_id: EventId,
        #[serde(default)]
        messages: Vec<ChatMessage>,
    },

    /// Unsolicited: someone posted in a conversation.
    NewMessage {
        event_id: EventId,
        message: ChatMessage,
    },

    /// Unsolicited: a peer started or stopped typing.
    Typing {
        event_id: EventId,
        user: ChatUser,
        is_typing: bool,
    },

    /// Protocol-level failure. May arrive at any point.
    Error { message: String },

    /// History could not be loaded.
    LoadMessagesError {
        error: String,
        #[serde(default)]
        event_id: Option<EventId>,
    },

    /// Any tag this client does not understand.
    #[serde(other)]
    Unrecognized,
}

impl ServerFrame {
    /// The conversation this frame belongs to, if it names one.
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::JoinedEvent { event_id }
            | Self::MessagesLoaded { event_id, .. }
            | Self::NewMessage { event_id, .. }
            | Self::Typing { event_id, .. } => Some(*event_id),
            Self::LoadMessagesError { event_id, .. } => *event_id,
            Self::AuthSuccess | Self::Error { .. } | Self::Unrecognized => None,
        }
    }

    /// The server-supplied reason if this is a protocol-error frame.
    pub fn protocol_error(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            Self::LoadMessagesError { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthSuccess => "auth_success",
            Self::JoinedEvent { .. } => "joined_event",
            Self::MessagesLoaded { .. } => "messages_loaded",
            Self::NewMessage { .. } => "new_message",
            Self::Typing { .. } => "typing",
            Self::Error { .. } => "error",
            Self::LoadMessagesError { .. } => "load_messages_error",
            Self::Unrecognized => "unrecognized",
        }
    }
}
