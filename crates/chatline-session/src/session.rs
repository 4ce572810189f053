//! The chat session: one logical connection to the chat backend.
//!
//! A [`ChatSession`] is a cheap, cloneable handle. The host's composition
//! root creates one and hands clones to whatever needs chat. Behind the
//! handle:
//!
//! - at most one **link** (a live or opening connection) at a time, driven
//!   by its own Tokio task;
//! - the **reconnection** counter and pending timer;
//! - the **listener registry** every inbound event fans out through.
//!
//! ```text
//!              connect()                 transport open
//! Disconnected ─────────→ Connecting ─────────────────→ Open
//!      ↑                      │                          │
//!      │  disconnect()        │ connect failed           │ closed / error
//!      └──────────────────────┴──────────┬───────────────┘
//!                                        ▼
//!                     schedule reconnect (unless manual or exhausted)
//! ```
//!
//! # Concurrency note
//!
//! State lives behind a `std::sync::Mutex` because every host-facing
//! operation is synchronous. The lock is never held across an `.await` and
//! listeners are never invoked while it is held.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chatline_protocol::{ChatUser, ClientFrame, Codec, EventId, JsonCodec, ServerFrame};
use chatline_transport::{Connection, Connector};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::listeners::{Listener, ListenerKind, ListenerRegistry, SessionEvent, Subscription};
use crate::{HandshakeOutcome, ReconnectPolicy, RejoinPolicy, SessionConfig};

/// Coarse connection state, for host indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link. A reconnection may still be scheduled.
    Disconnected,
    /// A link is being opened.
    Connecting,
    /// The transport is open and ready for frames.
    Open,
}

/// Work for a link's driver task.
enum Outbound {
    Frame(Vec<u8>),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseCause {
    /// `disconnect()` asked for it.
    Manual,
    /// The backend closed, the transport failed, or opening failed.
    Lost,
}

/// The session's one connection handle.
struct Link {
    /// Distinguishes this link from earlier ones whose driver tasks may
    /// still be winding down.
    generation: u64,
    /// The transport reported open.
    open: bool,
    outbound: mpsc::UnboundedSender<Outbound>,
}

struct LinkState {
    link: Option<Link>,
    /// Set by the open event, cleared by any close.
    ready: bool,
    reconnect: ReconnectPolicy,
    pending_reconnect: Option<JoinHandle<()>>,
    generation: u64,
    /// A non-manual loss happened and no link has opened since.
    recovering: bool,
}

struct Shared<C, K> {
    connector: C,
    codec: K,
    config: SessionConfig,
    state: Mutex<LinkState>,
    listeners: ListenerRegistry,
    /// Conversations whose handshake resolved, for automatic re-join.
    joined: Mutex<BTreeMap<EventId, ChatUser>>,
}

/// A chat session over connector `C`, encoding frames with codec `K`.
pub struct ChatSession<C: Connector, K: Codec = JsonCodec> {
    shared: Arc<Shared<C, K>>,
}

impl<C: Connector, K: Codec> Clone for ChatSession<C, K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> ChatSession<C, JsonCodec> {
    /// Creates a disconnected session speaking JSON.
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self::with_codec(connector, JsonCodec, config)
    }
}

impl<C: Connector, K: Codec> ChatSession<C, K> {
    /// Creates a disconnected session with a custom codec.
    pub fn with_codec(connector: C, codec: K, config: SessionConfig) -> Self {
        let config = config.validated();
        let reconnect = ReconnectPolicy::from_config(&config);
        debug!(endpoint = %config.endpoint, "chat session created");
        Self {
            shared: Arc::new(Shared {
                connector,
                codec,
                config,
                state: Mutex::new(LinkState {
                    link: None,
                    ready: false,
                    reconnect,
                    pending_reconnect: None,
                    generation: 0,
                    recovering: false,
                }),
                listeners: ListenerRegistry::new(),
                joined: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// The validated configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens a connection unless one is already open or opening.
    ///
    /// Must be called from within a Tokio runtime. Supersedes any pending
    /// reconnection timer. The reconnection counter is left alone; it
    /// resets on a successful open or on [`disconnect`](Self::disconnect).
    pub fn connect(&self) {
        let mut state = self.lock_state();
        if state.link.is_some() {
            debug!("connect ignored: connection already open or opening");
            return;
        }
        if let Some(timer) = state.pending_reconnect.take() {
            timer.abort();
        }
        self.open_link(&mut state);
    }

    /// Tears down the connection, cancels any pending reconnection, and
    /// resets the attempt counter. Never triggers a reconnection.
    pub fn disconnect(&self) {
        let mut state = self.lock_state();
        if let Some(timer) = state.pending_reconnect.take() {
            timer.abort();
        }
        state.reconnect.reset();
        state.ready = false;
        state.recovering = false;
        if let Some(link) = state.link.take() {
            info!(generation = link.generation, "disconnecting");
            // The driver may already be gone; nothing to tell it then.
            let _ = link.outbound.send(Outbound::Close);
        }
    }

    /// True only when the transport is open *and* the session marked itself
    /// ready.
    pub fn is_connected(&self) -> bool {
        let state = self.lock_state();
        Self::connected(&state)
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        let state = self.lock_state();
        match &state.link {
            None => ConnectionState::Disconnected,
            Some(link) if link.open && state.ready => ConnectionState::Open,
            Some(_) => ConnectionState::Connecting,
        }
    }

    /// Reconnection attempts scheduled since the last open or manual
    /// disconnect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock_state().reconnect.attempts()
    }

    /// Whether a reconnection timer is pending.
    pub fn is_reconnect_scheduled(&self) -> bool {
        self.lock_state()
            .pending_reconnect
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Encodes and queues `frame` for transmission.
    ///
    /// Returns `false`, without queuing, when not connected or when the
    /// frame cannot be encoded. `true` means handed to the transport, not
    /// delivered.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        let bytes = match self.shared.codec.encode(frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = frame.kind(), error = %e, "failed to encode frame");
                return false;
            }
        };

        let state = self.lock_state();
        if !Self::connected(&state) {
            debug!(kind = frame.kind(), "not connected, frame not sent");
            return false;
        }
        let Some(link) = state.link.as_ref() else {
            return false;
        };
        let queued = link.outbound.send(Outbound::Frame(bytes)).is_ok();
        trace!(kind = frame.kind(), queued, "frame queued");
        queued
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Subscribes `listener` to one listener set.
    ///
    /// A [`ListenerKind::Connection`] listener subscribed while already
    /// connected is invoked once immediately with
    /// [`SessionEvent::Connected`].
    pub fn subscribe<F>(&self, kind: ListenerKind, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let subscription = self.shared.listeners.subscribe(kind, Arc::clone(&listener));
        if kind == ListenerKind::Connection && self.is_connected() {
            ListenerRegistry::invoke(&listener, &SessionEvent::Connected);
        }
        subscription
    }

    /// Removes a listener. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.shared.listeners.unsubscribe(subscription)
    }

    /// Number of listeners in one set.
    pub fn listener_count(&self, kind: ListenerKind) -> usize {
        self.shared.listeners.len(kind)
    }

    /// Conversations that would be re-joined under
    /// [`RejoinPolicy::Automatic`].
    pub fn joined_conversations(&self) -> Vec<EventId> {
        self.lock_joined().keys().copied().collect()
    }

    pub(crate) fn remember(&self, event_id: EventId, user: &ChatUser) {
        self.lock_joined().insert(event_id, user.clone());
    }

    pub(crate) fn forget(&self, event_id: EventId) {
        self.lock_joined().remove(&event_id);
    }

    // -----------------------------------------------------------------------
    // Link driver
    // -----------------------------------------------------------------------

    fn open_link(&self, state: &mut LinkState) {
        state.generation += 1;
        let generation = state.generation;
        let (tx, rx) = mpsc::unbounded_channel();
        state.link = Some(Link {
            generation,
            open: false,
            outbound: tx,
        });
        debug!(generation, endpoint = %self.shared.config.endpoint, "opening connection");

        let session = self.clone();
        tokio::spawn(async move { session.drive(generation, rx).await });
    }

    /// Owns one connection from open to close.
    async fn drive(self, generation: u64, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
        let conn = match self.shared.connector.connect(&self.shared.config.endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(generation, error = %e, "connection attempt failed");
                self.shared
                    .listeners
                    .dispatch(&SessionEvent::TransportError(Arc::new(e)));
                self.handle_close(generation, CloseCause::Lost);
                return;
            }
        };

        if !self.handle_open(generation, &conn) {
            // disconnect() won the race while we were opening.
            let _ = conn.close().await;
            return;
        }

        let cause = self.run_io_loop(&conn, &mut outbound).await;
        if cause == CloseCause::Manual {
            if let Err(e) = conn.close().await {
                debug!(conn = %conn.id(), error = %e, "close failed");
            }
        }
        self.handle_close(generation, cause);
    }

    /// Pumps outbound frames and inbound frames until the link ends.
    async fn run_io_loop(
        &self,
        conn: &C::Connection,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> CloseCause {
        let conn_id = conn.id();
        loop {
            tokio::select! {
                biased;

                command = outbound.recv() => match command {
                    Some(Outbound::Frame(bytes)) => {
                        if let Err(e) = conn.send(&bytes).await {
                            warn!(conn = %conn_id, error = %e, "send failed");
                            self.shared
                                .listeners
                                .dispatch(&SessionEvent::TransportError(Arc::new(e)));
                            return CloseCause::Lost;
                        }
                    }
                    Some(Outbound::Close) | None => return CloseCause::Manual,
                },

                received = conn.recv() => match received {
                    Ok(Some(data)) => self.deliver(&data),
                    Ok(None) => {
                        info!(conn = %conn_id, "connection closed by backend");
                        return CloseCause::Lost;
                    }
                    Err(e) => {
                        warn!(conn = %conn_id, error = %e, "receive failed");
                        self.shared
                            .listeners
                            .dispatch(&SessionEvent::TransportError(Arc::new(e)));
                        return CloseCause::Lost;
                    }
                },
            }
        }
    }

    /// Decodes one inbound frame and fans it out. Bad frames stop here.
    fn deliver(&self, data: &[u8]) {
        match self.shared.codec.decode::<ServerFrame>(data) {
            Ok(ServerFrame::Unrecognized) => {
                debug!(len = data.len(), "ignoring unrecognized frame type");
            }
            Ok(frame) => {
                trace!(kind = frame.kind(), event_id = ?frame.event_id(), "frame received");
                self.shared.listeners.dispatch(&SessionEvent::Message(frame));
            }
            Err(e) => {
                warn!(len = data.len(), error = %e, "discarding malformed frame");
            }
        }
    }

    /// Marks the link open. Returns `false` if the link was superseded.
    fn handle_open(&self, generation: u64, conn: &C::Connection) -> bool {
        let rejoin = {
            let mut state = self.lock_state();
            match state.link.as_mut() {
                Some(link) if link.generation == generation => link.open = true,
                _ => return false,
            }
            state.ready = true;
            state.reconnect.reset();
            std::mem::take(&mut state.recovering)
        };

        info!(conn = %conn.id(), generation, recovered = rejoin, "connected");
        self.shared.listeners.dispatch(&SessionEvent::Connected);

        if rejoin && self.shared.config.rejoin_policy == RejoinPolicy::Automatic {
            self.rejoin_all();
        }
        true
    }

    /// Clears the link and, for a non-manual loss, schedules a reconnect.
    fn handle_close(&self, generation: u64, cause: CloseCause) {
        let mut state = self.lock_state();
        let current = state
            .link
            .as_ref()
            .is_some_and(|link| link.generation == generation);
        if !current {
            // Already torn down by disconnect().
            return;
        }
        state.link = None;
        state.ready = false;
        debug!(generation, ?cause, "connection closed");

        if cause == CloseCause::Manual {
            return;
        }
        state.recovering = true;
        self.schedule_reconnect(&mut state);
    }

    fn schedule_reconnect(&self, state: &mut LinkState) {
        let Some(delay) = state.reconnect.next_delay() else {
            warn!(
                attempts = state.reconnect.attempts(),
                "reconnect attempts exhausted, staying disconnected"
            );
            return;
        };
        info!(
            attempt = state.reconnect.attempts(),
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        let session = self.clone();
        state.pending_reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.reconnect_now();
        }));
    }

    /// Fired by the reconnect timer.
    fn reconnect_now(&self) {
        let mut state = self.lock_state();
        // This is our own handle; dropping it detaches rather than aborts.
        state.pending_reconnect = None;
        if state.link.is_some() {
            return;
        }
        self.open_link(&mut state);
    }

    fn rejoin_all(&self) {
        let conversations: Vec<(EventId, ChatUser)> = self
            .lock_joined()
            .iter()
            .map(|(event_id, user)| (*event_id, user.clone()))
            .collect();

        for (event_id, user) in conversations {
            info!(%event_id, "re-joining conversation after reconnect");
            let session = self.clone();
            tokio::spawn(async move {
                match session.initialize(event_id, &user).await {
                    Ok(HandshakeOutcome::Loaded(messages)) => {
                        debug!(%event_id, messages = messages.len(), "re-joined");
                    }
                    Ok(HandshakeOutcome::Unconfirmed) => {
                        warn!(%event_id, "re-join unconfirmed");
                    }
                    Err(e) => warn!(%event_id, error = %e, "re-join failed"),
                }
            });
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.shared.listeners
    }

    fn connected(state: &LinkState) -> bool {
        state.ready && state.link.as_ref().is_some_and(|link| link.open)
    }

    fn lock_state(&self) -> MutexGuard<'_, LinkState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_joined(&self) -> MutexGuard<'_, BTreeMap<EventId, ChatUser>> {
        self.shared.joined.lock().unwrap_or_else(|e| e.into_inner())
    }
}
