//! Shared helpers for the session integration suites.
//!
//! Every suite plays the backend through `MemoryPeer`, and most run with
//! Tokio's clock paused so backoff and timeouts are deterministic.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chatline_protocol::{ClientFrame, JsonCodec, Codec};
use chatline_session::{ChatSession, ListenerKind, SessionConfig, SessionEvent};
use chatline_transport::{MemoryAcceptor, MemoryConnector, MemoryPeer};

pub type Session = ChatSession<MemoryConnector>;

pub struct Harness {
    pub session: Session,
    pub connector: MemoryConnector,
    pub acceptor: MemoryAcceptor,
}

pub fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let (connector, acceptor) = MemoryConnector::new();
    let session = ChatSession::new(connector.clone(), config);
    Harness {
        session,
        connector,
        acceptor,
    }
}

impl Harness {
    /// Connects and returns the backend side once the session reports
    /// itself connected.
    pub async fn open(&mut self) -> MemoryPeer {
        self.session.connect();
        self.accept().await
    }

    /// Waits for the next connection the session opens.
    pub async fn accept(&mut self) -> MemoryPeer {
        let peer = tokio::time::timeout(Duration::from_secs(30), self.acceptor.accept())
            .await
            .expect("session should open a connection")
            .expect("connector alive");
        let session = self.session.clone();
        wait_until("session connected", move || session.is_connected()).await;
        peer
    }
}

/// Polls `cond` until it holds.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if result.is_err() {
        panic!("timed out waiting for {what}");
    }
}

/// Lets spawned tasks run to quiescence.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Receives and decodes the next frame the client sent.
pub async fn next_frame(peer: &mut MemoryPeer) -> ClientFrame {
    let bytes = tokio::time::timeout(Duration::from_secs(1), peer.recv())
        .await
        .expect("client should send a frame")
        .expect("connection open");
    JsonCodec.decode(&bytes).expect("client frames are valid JSON")
}

/// Asserts the client has not sent anything.
pub async fn assert_silent(peer: &mut MemoryPeer) {
    settle().await;
    if let Some(bytes) = peer.try_recv() {
        panic!(
            "unexpected frame: {}",
            String::from_utf8_lossy(&bytes)
        );
    }
}

/// Pushes a JSON frame from the backend.
pub fn push(peer: &MemoryPeer, frame: serde_json::Value) {
    assert!(peer.send(frame.to_string()), "client side gone");
}

/// Subscribes a counting listener and returns its counter.
pub fn count(session: &Session, kind: ListenerKind) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counter);
    session.subscribe(kind, move |_: &SessionEvent| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    counter
}

pub fn load(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
