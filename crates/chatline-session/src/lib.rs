//! Chat session client for Chatline.
//!
//! This crate is everything between a host application and the chat
//! backend's socket:
//!
//! 1. **Lifecycle**: one connection at a time, reconnection with bounded
//!    exponential backoff ([`ChatSession`], [`ReconnectPolicy`])
//! 2. **Handshake**: authenticate → join → load history
//!    ([`ChatSession::initialize`])
//! 3. **Fan-out**: typed events to any number of listeners
//!    ([`ListenerRegistry`], [`SessionEvent`])
//! 4. **Conversation operations**: send, typing, leave
//!
//! # How it fits in the stack
//!
//! ```text
//! Host application (above)  ← subscribes to events, calls operations
//!     ↕
//! Session Layer (this crate)  ← connection state, handshake, listeners
//!     ↕
//! Protocol / Transport (below)  ← frames and the socket
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chatline_protocol::{ChatUser, EventId};
//! use chatline_session::{ChatSession, ListenerKind, SessionConfig, SessionEvent};
//! use chatline_transport::WebSocketConnector;
//!
//! # async fn run() -> Result<(), chatline_session::SessionError> {
//! let config = SessionConfig::for_origin("https://events.example.com")?;
//! let session = ChatSession::new(WebSocketConnector, config);
//!
//! session.subscribe(ListenerKind::Message, |event| {
//!     if let SessionEvent::Message(frame) = event {
//!         println!("{frame:?}");
//!     }
//! });
//! session.connect();
//!
//! let outcome = session.initialize(EventId(7), &ChatUser::new(3, "ada")).await?;
//! println!("{outcome:?}");
//! session.send_message(EventId(7), "hello");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handshake;
mod listeners;
mod ops;
mod reconnect;
mod session;
mod typing;

pub use config::{RejoinPolicy, SessionConfig, TimeoutPolicy};
pub use error::SessionError;
pub use handshake::HandshakeOutcome;
pub use listeners::{Listener, ListenerKind, ListenerRegistry, SessionEvent, Subscription};
pub use reconnect::ReconnectPolicy;
pub use session::{ChatSession, ConnectionState};
pub use typing::TypingIndicator;
