//! Listener registry: fan-out of session events to host callbacks.
//!
//! Three independent sets, one per [`ListenerKind`]. Subscribing returns a
//! [`Subscription`] handle, which is the only way to unsubscribe.
//!
//! Dispatch works on a snapshot taken under the lock and invokes callbacks
//! after releasing it, so a callback may subscribe or unsubscribe (itself
//! included) without deadlocking. A callback that panics is logged and
//! skipped; the rest of the set still runs.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chatline_protocol::ServerFrame;
use chatline_transport::TransportError;

/// A host callback. Shared so dispatch can snapshot it cheaply.
pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// The three independent listener channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Every decoded inbound frame.
    Message,
    /// The transport opened.
    Connection,
    /// A transport-level error.
    Error,
}

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decoded inbound frame, in transport order.
    Message(ServerFrame),
    /// A connection was established.
    Connected,
    /// The transport failed to open, or failed while open.
    TransportError(Arc<TransportError>),
}

impl SessionEvent {
    /// The listener set this event is dispatched to.
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::Message(_) => ListenerKind::Message,
            Self::Connected => ListenerKind::Connection,
            Self::TransportError(_) => ListenerKind::Error,
        }
    }
}

/// Handle returned by [`ListenerRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: ListenerKind,
    id: u64,
}

impl Subscription {
    /// The set this subscription belongs to.
    pub fn kind(&self) -> ListenerKind {
        self.kind
    }
}

#[derive(Default)]
struct Sets {
    message: BTreeMap<u64, Listener>,
    connection: BTreeMap<u64, Listener>,
    error: BTreeMap<u64, Listener>,
}

impl Sets {
    fn get_mut(&mut self, kind: ListenerKind) -> &mut BTreeMap<u64, Listener> {
        match kind {
            ListenerKind::Message => &mut self.message,
            ListenerKind::Connection => &mut self.connection,
            ListenerKind::Error => &mut self.error,
        }
    }
}

/// Mutable sets of callbacks for the three listener channels.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    sets: Mutex<Sets>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `listener` to the `kind` set.
    pub fn subscribe(&self, kind: ListenerKind, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().get_mut(kind).insert(id, listener);
        tracing::trace!(?kind, id, "listener subscribed");
        Subscription { kind, id }
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let removed = self
            .lock()
            .get_mut(subscription.kind)
            .remove(&subscription.id)
            .is_some();
        tracing::trace!(kind = ?subscription.kind, id = subscription.id, removed, "listener unsubscribed");
        removed
    }

    /// Number of listeners currently in the `kind` set.
    pub fn len(&self, kind: ListenerKind) -> usize {
        self.lock().get_mut(kind).len()
    }

    /// Whether the `kind` set is empty.
    pub fn is_empty(&self, kind: ListenerKind) -> bool {
        self.len(kind) == 0
    }

    /// Delivers `event` to every listener of its kind.
    ///
    /// Returns how many listeners completed without panicking.
    pub fn dispatch(&self, event: &SessionEvent) -> usize {
        let snapshot: Vec<Listener> =
            self.lock().get_mut(event.kind()).values().cloned().collect();
        snapshot
            .iter()
            .filter(|listener| Self::invoke(listener, event))
            .count()
    }

    /// Runs one listener, containing any panic. Returns `false` on panic.
    pub(crate) fn invoke(listener: &Listener, event: &SessionEvent) -> bool {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(()) => true,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                tracing::error!(kind = ?event.kind(), %reason, "listener panicked");
                false
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sets> {
        // Callbacks never run under this lock, so poisoning is not expected;
        // recover anyway rather than take the session down.
        self.sets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: Listener = Arc::new(move |_: &SessionEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_dispatch_reaches_only_matching_kind() {
        let registry = ListenerRegistry::new();
        let (messages, on_message) = counter();
        let (connections, on_connect) = counter();
        registry.subscribe(ListenerKind::Message, on_message);
        registry.subscribe(ListenerKind::Connection, on_connect);

        registry.dispatch(&SessionEvent::Connected);
        assert_eq!(messages.load(Ordering::SeqCst), 0);
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let (first, a) = counter();
        let (third, c) = counter();
        registry.subscribe(ListenerKind::Message, a);
        registry.subscribe(
            ListenerKind::Message,
            Arc::new(|_: &SessionEvent| panic!("listener two blew up")),
        );
        registry.subscribe(ListenerKind::Message, c);

        let delivered =
            registry.dispatch(&SessionEvent::Message(ServerFrame::AuthSuccess));
        assert_eq!(delivered, 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_by_handle() {
        let registry = ListenerRegistry::new();
        let (count, listener) = counter();
        let sub = registry.subscribe(ListenerKind::Error, listener);
        assert_eq!(sub.kind(), ListenerKind::Error);
        assert_eq!(registry.len(ListenerKind::Error), 1);

        assert!(registry.unsubscribe(sub));
        assert!(!registry.unsubscribe(sub));
        assert!(registry.is_empty(ListenerKind::Error));

        let err = TransportError::ConnectionClosed("gone".into());
        registry.dispatch(&SessionEvent::TransportError(Arc::new(err)));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_callback_can_be_subscribed_twice() {
        let registry = ListenerRegistry::new();
        let (count, listener) = counter();
        let a = registry.subscribe(ListenerKind::Connection, Arc::clone(&listener));
        let b = registry.subscribe(ListenerKind::Connection, listener);
        assert_ne!(a, b);

        registry.dispatch(&SessionEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();

        let reg = Arc::clone(&registry);
        let own = Arc::clone(&slot);
        let sub = registry.subscribe(
            ListenerKind::Connection,
            Arc::new(move |_: &SessionEvent| {
                if let Some(sub) = own.lock().unwrap().take() {
                    reg.unsubscribe(sub);
                }
            }),
        );
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(registry.dispatch(&SessionEvent::Connected), 1);
        assert!(registry.is_empty(ListenerKind::Connection));
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(SessionEvent::Connected.kind(), ListenerKind::Connection);
        assert_eq!(
            SessionEvent::Message(ServerFrame::AuthSuccess).kind(),
            ListenerKind::Message
        );
    }
}
