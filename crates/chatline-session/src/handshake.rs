//! Conversation initialization: authenticate → join → load history.
//!
//! Each [`ChatSession::initialize`] call owns a short-lived [`Handshake`]
//! state machine plus two temporary listeners (one message, one
//! connection) that feed it. The listeners are removed when the call ends,
//! however it ends, because they live in a guard dropped with the future.
//!
//! ```text
//! AwaitingConnection ──connected──→ AwaitingAuth ──auth_success──→ AwaitingJoin
//!        ↑                                                            │
//!        └──── send failed / new connection restarts at auth          │ joined_event(id)
//!                                                                     ▼
//!                     Done ←──messages_loaded(id)── AwaitingHistory
//! ```
//!
//! Any protocol-error frame fails the call. Frames naming a different
//! conversation are ignored.

use chatline_protocol::{ChatMessage, ChatUser, ClientFrame, Codec, EventId, ServerFrame};
use chatline_transport::Connector;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::listeners::{ListenerKind, ListenerRegistry, SessionEvent, Subscription};
use crate::{ChatSession, SessionError, TimeoutPolicy};

/// How a successful initialization ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// All three steps were acknowledged; this is the first history page.
    Loaded(Vec<ChatMessage>),
    /// The handshake window lapsed under [`TimeoutPolicy::Proceed`].
    /// History was not confirmed.
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    AwaitingConnection,
    AwaitingAuth,
    AwaitingJoin,
    AwaitingHistory,
}

/// What the driver should do after feeding the handshake an input.
#[derive(Debug, PartialEq, Eq)]
enum Progress {
    Send(ClientFrame),
    Wait,
    Done(Vec<ChatMessage>),
    Failed(String),
}

/// The per-call protocol state machine. Pure: it decides, the session sends.
struct Handshake {
    event_id: EventId,
    user: ChatUser,
    page_size: u32,
    step: Step,
}

impl Handshake {
    fn new(event_id: EventId, user: ChatUser, page_size: u32) -> Self {
        Self {
            event_id,
            user,
            page_size,
            step: Step::AwaitingConnection,
        }
    }

    /// A connection opened (or was already open when the call started).
    /// Authentication is per connection, so this always restarts at step 1.
    fn on_connected(&mut self) -> Progress {
        self.step = Step::AwaitingAuth;
        Progress::Send(ClientFrame::auth(&self.user))
    }

    fn on_frame(&mut self, frame: &ServerFrame) -> Progress {
        if let Some(reason) = frame.protocol_error() {
            let other_conversation = frame.event_id().is_some_and(|id| id != self.event_id);
            if !other_conversation {
                return Progress::Failed(reason.to_owned());
            }
            return Progress::Wait;
        }

        match (self.step, frame) {
            (Step::AwaitingAuth, ServerFrame::AuthSuccess) => {
                self.step = Step::AwaitingJoin;
                Progress::Send(ClientFrame::JoinEvent {
                    event_id: self.event_id,
                })
            }
            (Step::AwaitingJoin, ServerFrame::JoinedEvent { event_id })
                if *event_id == self.event_id =>
            {
                self.step = Step::AwaitingHistory;
                Progress::Send(ClientFrame::LoadMessages {
                    event_id: self.event_id,
                    limit: self.page_size,
                    offset: 0,
                })
            }
            (Step::AwaitingHistory, ServerFrame::MessagesLoaded { event_id, messages })
                if *event_id == self.event_id =>
            {
                Progress::Done(messages.clone())
            }
            _ => Progress::Wait,
        }
    }

    /// A step's request could not be transmitted; wait for a connection.
    fn transmit_failed(&mut self) {
        self.step = Step::AwaitingConnection;
    }
}

/// Input to a running handshake, fed by its temporary listeners.
enum Signal {
    Connected,
    Frame(ServerFrame),
}

/// Unsubscribes the handshake's temporary listeners on drop.
struct TemporaryListeners<'a> {
    registry: &'a ListenerRegistry,
    subscriptions: Vec<Subscription>,
}

impl Drop for TemporaryListeners<'_> {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.registry.unsubscribe(subscription);
        }
    }
}

impl<C: Connector, K: Codec> ChatSession<C, K> {
    /// Initializes a conversation: authenticates `user`, joins `event_id`,
    /// and loads the first page of history.
    ///
    /// If the session is not connected yet, the handshake waits for the
    /// next connection. It is bounded by
    /// [`SessionConfig::handshake_timeout`](crate::SessionConfig::handshake_timeout);
    /// what a lapse means is set by [`TimeoutPolicy`].
    ///
    /// # Errors
    /// - [`SessionError::Rejected`]: the backend sent a protocol-error frame
    /// - [`SessionError::HandshakeTimeout`]: window lapsed under
    ///   [`TimeoutPolicy::Fail`]
    pub async fn initialize(
        &self,
        event_id: EventId,
        user: &ChatUser,
    ) -> Result<HandshakeOutcome, SessionError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scope = TemporaryListeners {
            registry: self.listeners(),
            subscriptions: Vec::with_capacity(2),
        };

        let frames = tx.clone();
        scope.subscriptions.push(self.subscribe(ListenerKind::Message, move |event| {
            if let SessionEvent::Message(frame) = event {
                if is_handshake_frame(frame) {
                    let _ = frames.send(Signal::Frame(frame.clone()));
                }
            }
        }));
        // Subscribed second: if already connected this replays immediately,
        // and the message listener is in place before `auth` goes out.
        scope.subscriptions.push(self.subscribe(ListenerKind::Connection, move |_| {
            let _ = tx.send(Signal::Connected);
        }));

        debug!(%event_id, user = %user.id, "initializing conversation");
        let mut handshake =
            Handshake::new(event_id, user.clone(), self.config().history_page_size);

        let run = async {
            while let Some(signal) = rx.recv().await {
                let progress = match signal {
                    Signal::Connected => handshake.on_connected(),
                    Signal::Frame(frame) => handshake.on_frame(&frame),
                };
                match progress {
                    Progress::Send(frame) => {
                        if !self.send(&frame) {
                            debug!(%event_id, kind = frame.kind(), "handshake send failed, awaiting connection");
                            handshake.transmit_failed();
                        }
                    }
                    Progress::Wait => {}
                    Progress::Done(messages) => return Ok(messages),
                    Progress::Failed(reason) => {
                        return Err(SessionError::Rejected { event_id, reason });
                    }
                }
            }
            Err(SessionError::Interrupted(event_id))
        };

        let result = tokio::time::timeout(self.config().handshake_timeout, run).await;
        drop(scope);

        match result {
            Ok(Ok(messages)) => {
                info!(%event_id, messages = messages.len(), "conversation initialized");
                self.remember(event_id, user);
                Ok(HandshakeOutcome::Loaded(messages))
            }
            Ok(Err(e)) => {
                warn!(%event_id, error = %e, "conversation initialization failed");
                Err(e)
            }
            Err(_elapsed) => match self.config().timeout_policy {
                TimeoutPolicy::Proceed => {
                    warn!(%event_id, "handshake timed out, proceeding unconfirmed");
                    self.remember(event_id, user);
                    Ok(HandshakeOutcome::Unconfirmed)
                }
                TimeoutPolicy::Fail => {
                    warn!(%event_id, "handshake timed out");
                    Err(SessionError::HandshakeTimeout(event_id))
                }
            },
        }
    }
}

/// Frames a handshake can act on. Everything else is not worth cloning.
fn is_handshake_frame(frame: &ServerFrame) -> bool {
    matches!(
        frame,
        ServerFrame::AuthSuccess
            | ServerFrame::JoinedEvent { .. }
            | ServerFrame::MessagesLoaded { .. }
            | ServerFrame::Error { .. }
            | ServerFrame::LoadMessagesError { .. }
    )
}
