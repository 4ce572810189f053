//! Wire protocol for Chatline.
//!
//! This crate defines the frames a chat client and the chat backend
//! exchange:
//!
//! - **Frames** ([`ClientFrame`], [`ServerFrame`]): one variant per message
//!   type, tagged on `"type"`.
//! - **Payload types** ([`ChatMessage`], [`ChatUser`], [`EventId`], [`UserId`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and session
//! (handshake and listeners). It knows nothing about connections.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerFrame / ClientFrame) → Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ChatMessage, ChatUser, ClientFrame, EventId, ServerFrame, UserId};
