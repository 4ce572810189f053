//! In-memory transport backed by Tokio channels.
//!
//! Each call to [`MemoryConnector::connect`] creates a connected pair: the
//! [`MemoryConnection`] handed to the client and a [`MemoryPeer`] delivered
//! to whoever holds the [`MemoryAcceptor`]. The peer plays the backend:
//! it reads what the client sent and pushes frames, closes or failures back.
//!
//! ```text
//! MemoryConnector::connect() ──→ MemoryConnection (client side)
//!                 │
//!                 └──────────→ MemoryAcceptor::accept() → MemoryPeer (backend side)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Connector, Endpoint, TransportError};

/// What the backend side can push to the client side.
#[derive(Debug)]
enum PeerEvent {
    Frame(Vec<u8>),
    Close,
    Fail(String),
}

struct Shared {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusing: AtomicBool,
    attempts: AtomicU64,
}

/// A [`Connector`] whose connections terminate in the same process.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    /// Creates a connector and the acceptor that receives its peers.
    pub fn new() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                peers: tx,
                refusing: AtomicBool::new(false),
                attempts: AtomicU64::new(0),
            }),
        };
        (connector, MemoryAcceptor { peers: rx })
    }

    /// While `true`, every connection attempt fails with
    /// [`TransportError::ConnectFailed`].
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Total number of connection attempts, successful or not.
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Self::Connection, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        if self.shared.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{endpoint} refused the connection"),
            )));
        }

        let id = ConnectionId::next();
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (from_peer_tx, from_peer_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            id,
            inbound: to_peer_rx,
            outbound: from_peer_tx,
        };
        self.shared.peers.send(peer).map_err(|_| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "acceptor dropped",
            ))
        })?;

        tracing::debug!(%id, %endpoint, "in-memory connection open");
        Ok(MemoryConnection {
            id,
            to_peer: std::sync::Mutex::new(Some(to_peer_tx)),
            from_peer: Mutex::new(from_peer_rx),
        })
    }
}

/// Receives the backend side of every connection the connector opens.
pub struct MemoryAcceptor {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    /// Waits for the next connection. Returns `None` once every connector
    /// clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Returns an already-opened connection without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

/// The backend side of an in-memory connection.
pub struct MemoryPeer {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<PeerEvent>,
}

impl MemoryPeer {
    /// The id shared with the client-side connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the next frame the client sent. Returns `None` once the
    /// client closed or dropped its connection.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Returns a frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }

    /// Pushes a frame to the client. Returns `false` if the client side
    /// is gone.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        self.outbound.send(PeerEvent::Frame(data.into())).is_ok()
    }

    /// Closes the connection from the backend side.
    pub fn close(&self) {
        let _ = self.outbound.send(PeerEvent::Close);
    }

    /// Makes the client's next `recv` fail with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.outbound.send(PeerEvent::Fail(reason.into()));
    }
}

/// The client side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    to_peer: std::sync::Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    from_peer: Mutex<mpsc::UnboundedReceiver<PeerEvent>>,
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let guard = self.to_peer.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::ConnectionClosed(
                "connection already closed".into(),
            ));
        };
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer dropped",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.from_peer.lock().await.recv().await {
            Some(PeerEvent::Frame(data)) => Ok(Some(data)),
            Some(PeerEvent::Close) | None => Ok(None),
            Some(PeerEvent::Fail(reason)) => Err(TransportError::ReceiveFailed(
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, reason),
            )),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender is what the peer observes as a close.
        self.to_peer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
