//! # Chatline
//!
//! Real-time chat client for event conversations.
//!
//! Chatline keeps one connection to the chat backend alive, authenticates
//! and joins conversations, and fans inbound frames out to whoever
//! subscribed. Hosts build a [`ChatSession`](prelude::ChatSession) once and
//! pass clones around.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatline::prelude::*;
//!
//! # async fn run() -> Result<(), ChatlineError> {
//! let session = ChatClientBuilder::new()
//!     .origin("https://events.example.com")
//!     .build()?;
//! session.connect();
//!
//! let ada = ChatUser::new(3, "ada");
//! session.initialize(EventId(7), &ada).await?;
//! session.send_message(EventId(7), "hello");
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;

pub use builder::ChatClientBuilder;
pub use error::ChatlineError;

/// Everything a host usually needs, in one import.
pub mod prelude {
    pub use crate::{ChatClientBuilder, ChatlineError};
    pub use chatline_protocol::{
        ChatMessage, ChatUser, ClientFrame, Codec, EventId, JsonCodec, ServerFrame, UserId,
    };
    pub use chatline_session::{
        ChatSession, ConnectionState, HandshakeOutcome, ListenerKind, RejoinPolicy,
        SessionConfig, SessionError, SessionEvent, Subscription, TimeoutPolicy,
        TypingIndicator,
    };
    pub use chatline_transport::{Connector, Endpoint, TransportError, WebSocketConnector};
}
