//! Debounced typing indicator.
//!
//! Keystrokes arrive far more often than peers need to hear about them.
//! [`TypingIndicator`] sends `typing{isTyping:true}` on the first keystroke
//! and then at most once per interval while typing continues, plus a
//! single `typing{isTyping:false}` when the host says typing stopped.

use std::time::Duration;

use chatline_protocol::{Codec, EventId};
use chatline_transport::Connector;
use tokio::time::Instant;

use crate::ChatSession;

/// Per-conversation typing state for one composer.
pub struct TypingIndicator<C: Connector, K: Codec> {
    session: ChatSession<C, K>,
    event_id: EventId,
    interval: Duration,
    /// When `isTyping:true` last went out. `None` while idle.
    last_sent: Option<Instant>,
}

impl<C: Connector, K: Codec> TypingIndicator<C, K> {
    /// Creates an idle indicator using the session's `typing_interval`.
    pub fn new(session: ChatSession<C, K>, event_id: EventId) -> Self {
        let interval = session.config().typing_interval;
        Self {
            session,
            event_id,
            interval,
            last_sent: None,
        }
    }

    /// Overrides the re-announce interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Records a keystroke. Returns `true` if a typing frame was sent.
    pub fn keystroke(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        if self.session.send_typing(self.event_id, true) {
            self.last_sent = Some(now);
            true
        } else {
            false
        }
    }

    /// Records that typing stopped. Sends `isTyping:false` only if a
    /// `true` went out since the last stop.
    pub fn stop(&mut self) -> bool {
        if self.last_sent.take().is_none() {
            return false;
        }
        self.session.send_typing(self.event_id, false)
    }

    /// Whether peers currently believe the caller is typing.
    pub fn is_typing(&self) -> bool {
        self.last_sent.is_some()
    }

    /// The conversation this indicator reports for.
    pub fn event_id(&self) -> EventId {
        self.event_id
    }
}
