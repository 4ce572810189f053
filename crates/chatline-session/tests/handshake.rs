//! Integration tests for conversation initialization (the
//! authenticate → join → load-history handshake) and re-join policy.

mod common;

use std::time::Duration;

use chatline_protocol::{ChatMessage, ChatUser, ClientFrame, EventId, UserId};
use chatline_session::{
    HandshakeOutcome, ListenerKind, RejoinPolicy, SessionConfig, SessionError, TimeoutPolicy,
};
use common::*;
use serde_json::json;
use tokio::task::JoinHandle;

fn ada() -> ChatUser {
    ChatUser::new(3, "ada")
}

fn spawn_initialize(
    session: &Session,
    event_id: u64,
) -> JoinHandle<Result<HandshakeOutcome, SessionError>> {
    let session = session.clone();
    tokio::spawn(async move { session.initialize(EventId(event_id), &ada()).await })
}

/// Plays the backend side of a successful handshake for `event_id`.
async fn serve_handshake(peer: &mut chatline_transport::MemoryPeer, event_id: u64) {
    assert_eq!(
        next_frame(peer).await,
        ClientFrame::Auth {
            user_id: UserId(3),
            user_name: "ada".into()
        }
    );
    push(peer, json!({"type": "auth_success"}));
    assert_eq!(
        next_frame(peer).await,
        ClientFrame::JoinEvent { event_id: EventId(event_id) }
    );
    push(peer, json!({"type": "joined_event", "eventId": event_id}));
    assert_eq!(
        next_frame(peer).await,
        ClientFrame::LoadMessages {
            event_id: EventId(event_id),
            limit: 50,
            offset: 0
        }
    );
    push(peer, json!({"type": "messages_loaded", "eventId": event_id, "messages": []}));
}

// =========================================================================
// Happy paths
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cold_start_initialize_resolves_with_empty_history() {
    let mut h = harness();
    let mut peer = h.open().await;

    let init = spawn_initialize(&h.session, 7);
    serve_handshake(&mut peer, 7).await;

    let outcome = init.await.unwrap().expect("handshake succeeds");
    assert_eq!(outcome, HandshakeOutcome::Loaded(vec![]));
    assert_eq!(h.session.listener_count(ListenerKind::Message), 0);
    assert_eq!(h.session.listener_count(ListenerKind::Connection), 0);
    assert_eq!(h.session.joined_conversations(), vec![EventId(7)]);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_returns_loaded_history() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);

    next_frame(&mut peer).await;
    push(&peer, json!({"type": "auth_success"}));
    next_frame(&mut peer).await;
    push(&peer, json!({"type": "joined_event", "eventId": 7}));
    next_frame(&mut peer).await;
    push(
        &peer,
        json!({"type": "messages_loaded", "eventId": 7, "messages": [
            {"id": 1, "userId": 9, "userName": "bo", "content": "first"},
            {"id": 2, "userId": 3, "userName": "ada", "content": "second"}
        ]}),
    );

    let HandshakeOutcome::Loaded(messages) = init.await.unwrap().unwrap() else {
        panic!("expected loaded history");
    };
    let contents: Vec<&str> = messages.iter().map(|m: &ChatMessage| m.content.as_str()).collect();
    assert_eq!(contents, ["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_before_connect_waits_for_connection() {
    let mut h = harness();
    let init = spawn_initialize(&h.session, 7);
    settle().await;
    assert_eq!(h.connector.attempts(), 0);
    assert_eq!(h.session.listener_count(ListenerKind::Connection), 1);

    let mut peer = h.open().await;
    serve_handshake(&mut peer, 7).await;
    assert!(matches!(init.await.unwrap(), Ok(HandshakeOutcome::Loaded(_))));
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_steps_wait_for_their_acknowledgement() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);

    assert!(matches!(next_frame(&mut peer).await, ClientFrame::Auth { .. }));

    // Acks for later steps before auth_success must not advance anything.
    push(&peer, json!({"type": "joined_event", "eventId": 7}));
    push(&peer, json!({"type": "messages_loaded", "eventId": 7, "messages": []}));
    assert_silent(&mut peer).await;

    push(&peer, json!({"type": "auth_success"}));
    assert!(matches!(next_frame(&mut peer).await, ClientFrame::JoinEvent { .. }));

    // History ack before the join ack: still nothing.
    push(&peer, json!({"type": "messages_loaded", "eventId": 7, "messages": []}));
    assert_silent(&mut peer).await;

    // A join ack for a different conversation is not ours.
    push(&peer, json!({"type": "joined_event", "eventId": 8}));
    assert_silent(&mut peer).await;

    push(&peer, json!({"type": "joined_event", "eventId": 7}));
    assert!(matches!(next_frame(&mut peer).await, ClientFrame::LoadMessages { .. }));

    push(&peer, json!({"type": "messages_loaded", "eventId": 8, "messages": []}));
    settle().await;
    assert!(!init.is_finished(), "other conversation's history ignored");

    push(&peer, json!({"type": "messages_loaded", "eventId": 7, "messages": []}));
    assert!(matches!(init.await.unwrap(), Ok(HandshakeOutcome::Loaded(_))));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_handshakes_for_different_conversations() {
    let mut h = harness();
    let mut peer = h.open().await;
    let seven = spawn_initialize(&h.session, 7);
    let eight = spawn_initialize(&h.session, 8);

    assert!(matches!(next_frame(&mut peer).await, ClientFrame::Auth { .. }));
    assert!(matches!(next_frame(&mut peer).await, ClientFrame::Auth { .. }));
    push(&peer, json!({"type": "auth_success"}));

    let mut joins = vec![next_frame(&mut peer).await, next_frame(&mut peer).await];
    joins.sort_by_key(|f| match f {
        ClientFrame::JoinEvent { event_id } => event_id.0,
        other => panic!("expected join, got {other:?}"),
    });
    assert_eq!(joins[0], ClientFrame::JoinEvent { event_id: EventId(7) });
    assert_eq!(joins[1], ClientFrame::JoinEvent { event_id: EventId(8) });

    push(&peer, json!({"type": "joined_event", "eventId": 8}));
    assert_eq!(
        next_frame(&mut peer).await,
        ClientFrame::LoadMessages { event_id: EventId(8), limit: 50, offset: 0 }
    );
    push(&peer, json!({"type": "messages_loaded", "eventId": 8, "messages": []}));
    assert!(eight.await.unwrap().is_ok());
    assert!(!seven.is_finished());

    push(&peer, json!({"type": "joined_event", "eventId": 7}));
    next_frame(&mut peer).await;
    push(&peer, json!({"type": "messages_loaded", "eventId": 7, "messages": []}));
    assert!(seven.await.unwrap().is_ok());
}

// =========================================================================
// Failures and timeouts
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_protocol_error_rejects_initialization() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);

    next_frame(&mut peer).await;
    push(&peer, json!({"type": "error", "message": "invalid user"}));

    match init.await.unwrap() {
        Err(SessionError::Rejected { event_id, reason }) => {
            assert_eq!(event_id, EventId(7));
            assert_eq!(reason, "invalid user");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(h.session.listener_count(ListenerKind::Message), 0);
    assert!(h.session.joined_conversations().is_empty());

    // No further steps after the failure.
    push(&peer, json!({"type": "auth_success"}));
    assert_silent(&mut peer).await;
}

#[tokio::test(start_paused = true)]
async fn test_load_messages_error_rejects_initialization() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);

    next_frame(&mut peer).await;
    push(&peer, json!({"type": "auth_success"}));
    next_frame(&mut peer).await;
    push(&peer, json!({"type": "joined_event", "eventId": 7}));
    next_frame(&mut peer).await;
    push(&peer, json!({"type": "load_messages_error", "error": "history unavailable"}));

    let err = init.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("history unavailable"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_proceeds_unconfirmed_by_default() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    next_frame(&mut peer).await;

    // The backend never answers.
    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert!(!init.is_finished());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(init.await.unwrap().unwrap(), HandshakeOutcome::Unconfirmed);
    assert_eq!(h.session.listener_count(ListenerKind::Message), 0);
    assert_eq!(h.session.listener_count(ListenerKind::Connection), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_under_fail_policy() {
    let mut h = harness_with(SessionConfig {
        timeout_policy: TimeoutPolicy::Fail,
        ..SessionConfig::default()
    });
    let _peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(matches!(
        init.await.unwrap(),
        Err(SessionError::HandshakeTimeout(EventId(7)))
    ));
    assert!(h.session.joined_conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_initialize_removes_temporary_listeners() {
    let mut h = harness();
    let _peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    settle().await;
    assert_eq!(h.session.listener_count(ListenerKind::Message), 1);

    init.abort();
    let _ = init.await;
    assert_eq!(h.session.listener_count(ListenerKind::Message), 0);
    assert_eq!(h.session.listener_count(ListenerKind::Connection), 0);
}

// =========================================================================
// Re-join policy
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_policy_does_not_rejoin_after_reconnect() {
    let mut h = harness();
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    serve_handshake(&mut peer, 7).await;
    init.await.unwrap().unwrap();

    peer.close();
    let mut again = h.accept().await;
    assert_silent(&mut again).await;
}

#[tokio::test(start_paused = true)]
async fn test_automatic_policy_rejoins_after_reconnect() {
    let mut h = harness_with(SessionConfig {
        rejoin_policy: RejoinPolicy::Automatic,
        ..SessionConfig::default()
    });
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    serve_handshake(&mut peer, 7).await;
    init.await.unwrap().unwrap();

    peer.close();
    let mut again = h.accept().await;
    serve_handshake(&mut again, 7).await;
    settle().await;
    assert_eq!(h.session.listener_count(ListenerKind::Message), 0);
}

#[tokio::test(start_paused = true)]
async fn test_automatic_policy_skips_conversations_left() {
    let mut h = harness_with(SessionConfig {
        rejoin_policy: RejoinPolicy::Automatic,
        ..SessionConfig::default()
    });
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    serve_handshake(&mut peer, 7).await;
    init.await.unwrap().unwrap();

    assert!(h.session.leave_conversation(EventId(7)));
    assert_eq!(
        next_frame(&mut peer).await,
        ClientFrame::LeaveEvent { event_id: EventId(7) }
    );
    assert!(h.session.joined_conversations().is_empty());

    peer.close();
    let mut again = h.accept().await;
    assert_silent(&mut again).await;
}

#[tokio::test(start_paused = true)]
async fn test_automatic_policy_ignores_manual_reconnect() {
    let mut h = harness_with(SessionConfig {
        rejoin_policy: RejoinPolicy::Automatic,
        ..SessionConfig::default()
    });
    let mut peer = h.open().await;
    let init = spawn_initialize(&h.session, 7);
    serve_handshake(&mut peer, 7).await;
    init.await.unwrap().unwrap();

    // A deliberate disconnect/connect cycle is the host's own doing.
    h.session.disconnect();
    settle().await;
    let mut again = h.open().await;
    assert_silent(&mut again).await;
}
