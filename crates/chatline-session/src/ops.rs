//! Conversation operations.
//!
//! Each builds one frame and hands it to [`ChatSession::send`]. None waits
//! for the backend; the `bool` only says whether the frame went out.

use chatline_protocol::{ClientFrame, Codec, EventId};
use chatline_transport::Connector;
use tracing::debug;

use crate::ChatSession;

impl<C: Connector, K: Codec> ChatSession<C, K> {
    /// Posts `text` to a conversation.
    ///
    /// Returns `false` if not connected or if `text` is blank. Surrounding
    /// whitespace is trimmed before sending. Any confirmation arrives later
    /// as a `new_message` frame.
    pub fn send_message(&self, event_id: EventId, text: &str) -> bool {
        let content = text.trim();
        if content.is_empty() {
            debug!(%event_id, "refusing to send blank message");
            return false;
        }
        self.send(&ClientFrame::SendMessage {
            event_id,
            content: content.to_owned(),
        })
    }

    /// Announces that the caller started or stopped typing.
    ///
    /// Hosts normally go through [`TypingIndicator`](crate::TypingIndicator),
    /// which debounces repeated keystrokes.
    pub fn send_typing(&self, event_id: EventId, is_typing: bool) -> bool {
        self.send(&ClientFrame::Typing { event_id, is_typing })
    }

    /// Leaves a conversation. The session also stops re-joining it after
    /// reconnects, whether or not the frame could be sent.
    pub fn leave_conversation(&self, event_id: EventId) -> bool {
        self.forget(event_id);
        self.send(&ClientFrame::LeaveEvent { event_id })
    }
}
