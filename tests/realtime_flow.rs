//! Integration tests for the realtime coordination layer.
//!
//! Drives the application services end-to-end over the in-memory
//! adapters: signaling relay targeting, whiteboard last-write-wins and
//! bridge fan-out, lifecycle expiry, and control handoff.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, watch};

use classroom_live::adapters::bus::InMemoryBus;
use classroom_live::adapters::directory::InMemorySessionDirectory;
use classroom_live::adapters::registry::InMemorySessionRegistry;
use classroom_live::adapters::store::InMemorySnapshotStore;
use classroom_live::application::{
    events, ControlError, ControlHandoff, RelayError, SessionLifecycle, SessionPolicy,
    SignalRelay, SnapshotBridge, WhiteboardSync,
};
use classroom_live::domain::channels;
use classroom_live::domain::foundation::{ClassroomId, Role, SessionId, Timestamp, UserId};
use classroom_live::domain::session::SessionError;
use classroom_live::domain::signaling::SignalEnvelope;
use classroom_live::ports::{AuthenticatedUser, SessionRegistry};

struct TestStack {
    registry: Arc<InMemorySessionRegistry>,
    directory: Arc<InMemorySessionDirectory>,
    bus: Arc<InMemoryBus>,
    store: Arc<InMemorySnapshotStore>,
    lifecycle: Arc<SessionLifecycle>,
    relay: SignalRelay,
    whiteboard: WhiteboardSync,
    control: ControlHandoff,
    bridge: SnapshotBridge,
}

fn stack_with_policy(policy: SessionPolicy) -> TestStack {
    let registry = Arc::new(InMemorySessionRegistry::new());
    let directory = Arc::new(InMemorySessionDirectory::new());
    let bus = Arc::new(InMemoryBus::new());
    let store = Arc::new(InMemorySnapshotStore::new());
    let (fanout_tx, fanout_rx) = mpsc::channel(32);

    TestStack {
        lifecycle: Arc::new(SessionLifecycle::new(
            registry.clone(),
            directory.clone(),
            bus.clone(),
            policy,
        )),
        relay: SignalRelay::new(registry.clone(), bus.clone()),
        whiteboard: WhiteboardSync::new(registry.clone(), store.clone(), fanout_tx),
        control: ControlHandoff::new(registry.clone(), bus.clone()),
        bridge: SnapshotBridge::new(bus.clone(), fanout_rx),
        registry,
        directory,
        bus,
        store,
    }
}

fn stack() -> TestStack {
    stack_with_policy(SessionPolicy {
        capacity: None,
        idle_timeout: Duration::from_secs(3_600),
    })
}

fn teacher(id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: UserId::new(id).unwrap(),
        role: Role::Teacher,
        class_id: ClassroomId::new(),
    }
}

fn student(id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: UserId::new(id).unwrap(),
        role: Role::Student,
        class_id: ClassroomId::new(),
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn signal(session_id: SessionId, sender: &str, target: &str) -> SignalEnvelope {
    SignalEnvelope {
        session_id,
        sender_id: user(sender),
        target_id: user(target),
        signal: json!({"type": "offer", "sdp": "v=0"}),
        is_return_signal: false,
    }
}

async fn started_session(stack: &TestStack, teacher_id: &str) -> SessionId {
    stack
        .lifecycle
        .start(&teacher(teacher_id), ClassroomId::new())
        .await
        .unwrap()
}

// ════════════════════════════════════════════════════════════════════════════
// Scenario A: membership gates the relay
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scenario_a_signal_to_non_participant_fails() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;

    // Student A joins; participant set is exactly {A}.
    s.lifecycle.join(session_id, &student("student-a")).await.unwrap();
    {
        let handle = s.registry.get(&session_id).await.unwrap();
        let session = handle.read().await;
        assert_eq!(session.participant_count(), 1);
        assert!(session.is_participant(&user("student-a")));
    }

    // B never joined: the signal is dropped, not queued.
    let result = s.relay.relay(signal(session_id, "student-a", "student-b")).await;
    assert!(matches!(
        result,
        Err(RelayError::UnknownParticipant(u)) if u.as_str() == "student-b"
    ));
    assert_eq!(s.bus.published().len(), 0);
}

// ════════════════════════════════════════════════════════════════════════════
// Targeting: broadcast delivery, payload-level addressing
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn signal_broadcast_is_addressed_to_exactly_one_peer() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    for id in ["p", "q", "r"] {
        s.lifecycle.join(session_id, &student(id)).await.unwrap();
    }

    let channel = channels::session_channel(&session_id);
    let mut subscriber_r = s.bus.subscribe(&channel);

    s.relay.relay(signal(session_id, "p", "q")).await.unwrap();

    // r receives the channel broadcast but can detect the mismatch: the
    // payload names q, and only q, as the target.
    let seen_by_r = subscriber_r.recv().await.unwrap();
    assert_eq!(seen_by_r.event, events::SIGNAL);
    assert_eq!(seen_by_r.payload["target"], "q");
    assert_ne!(seen_by_r.payload["target"], "r");
    assert_eq!(seen_by_r.payload["senderId"], "p");
}

#[tokio::test]
async fn relay_forwards_every_duplicate_without_dedup() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    s.lifecycle.join(session_id, &student("p")).await.unwrap();
    s.lifecycle.join(session_id, &student("q")).await.unwrap();

    let envelope = signal(session_id, "p", "q");
    s.relay.relay(envelope.clone()).await.unwrap();
    s.relay.relay(envelope).await.unwrap();

    // At-least-once: consumers own dedup, the relay never does.
    assert_eq!(s.bus.published().len(), 2);
}

// ════════════════════════════════════════════════════════════════════════════
// Scenario B + last-write-wins
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scenario_b_fetch_absent_then_present() {
    let s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("sender-a")).await.unwrap();

    assert!(s.whiteboard.fetch_latest(&room).await.unwrap().is_none());

    s.whiteboard
        .publish_update(room, json!({"snapshot": "X"}), user("sender-a"))
        .await
        .unwrap();

    let latest = s.whiteboard.fetch_latest(&room).await.unwrap().unwrap();
    assert_eq!(latest.content, json!({"snapshot": "X"}));
    assert_eq!(latest.sender_id, user("sender-a"));
}

#[tokio::test]
async fn fetch_latest_returns_most_recently_arrived_update() {
    let s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("a")).await.unwrap();
    s.lifecycle.join(room, &student("b")).await.unwrap();

    for rev in 0..5 {
        let writer = if rev % 2 == 0 { "a" } else { "b" };
        s.whiteboard
            .publish_update(room, json!({"rev": rev}), user(writer))
            .await
            .unwrap();
    }

    let latest = s.whiteboard.fetch_latest(&room).await.unwrap().unwrap();
    assert_eq!(latest.content, json!({"rev": 4}));
}

#[tokio::test]
async fn whiteboard_update_reaches_live_subscribers_via_bridge() {
    let mut s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("a")).await.unwrap();

    let channel = channels::session_channel(&room);
    let mut subscriber = s.bus.subscribe(&channel);

    s.whiteboard
        .publish_update(room, json!({"strokes": [1, 2]}), user("a"))
        .await
        .unwrap();

    assert!(s.bridge.relay_next().await);

    let event = subscriber.recv().await.unwrap();
    assert_eq!(event.event, events::WHITEBOARD_UPDATED);
    // Sender tag and server timestamp let subscribers drop their own echo.
    assert_eq!(event.payload["senderId"], "a");
    assert!(event.payload.get("updatedAt").is_some());
    assert_eq!(event.payload["snapshot"], json!({"strokes": [1, 2]}));
}

#[tokio::test]
async fn bridge_task_drains_queue_in_background() {
    let s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("a")).await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bridge_task = tokio::spawn(s.bridge.run(shutdown_rx));

    s.whiteboard
        .publish_update(room, json!({"rev": 1}), user("a"))
        .await
        .unwrap();

    // Give the background stage a moment to relay.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(s.bus.has_event(events::WHITEBOARD_UPDATED));

    shutdown_tx.send(true).unwrap();
    bridge_task.await.unwrap();
}

#[tokio::test]
async fn store_outage_does_not_block_live_delivery() {
    let mut s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("a")).await.unwrap();

    s.store.set_unavailable(true);
    let receipt = s
        .whiteboard
        .publish_update(room, json!({"rev": 1}), user("a"))
        .await
        .unwrap();
    assert!(!receipt.persisted);

    assert!(s.bridge.relay_next().await);
    assert!(s.bus.has_event(events::WHITEBOARD_UPDATED));
}

// ════════════════════════════════════════════════════════════════════════════
// Scenario C + sweep
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scenario_c_join_after_end_time_fails() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;

    {
        let handle = s.registry.get(&session_id).await.unwrap();
        handle
            .write()
            .await
            .end(Timestamp::now().minus_secs(60))
            .unwrap();
    }

    let result = s.lifecycle.join(session_id, &student("student-c")).await;
    assert_eq!(result, Err(SessionError::Expired));
}

#[tokio::test]
async fn sweep_is_idempotent_with_no_state_change() {
    let s = stack_with_policy(SessionPolicy {
        capacity: None,
        idle_timeout: Duration::from_secs(0),
    });
    started_session(&s, "teacher-t").await;
    started_session(&s, "teacher-u").await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(s.lifecycle.sweep_expired().await, 2);
    // Immediate re-sweep with no state change in between.
    assert_eq!(s.lifecycle.sweep_expired().await, 0);
}

#[tokio::test]
async fn sweep_records_end_time_in_directory() {
    let s = stack_with_policy(SessionPolicy {
        capacity: None,
        idle_timeout: Duration::from_secs(0),
    });
    let session_id = started_session(&s, "teacher-t").await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(s.lifecycle.sweep_expired().await, 1);
    assert!(s.directory.ended_at(&session_id).await.is_some());
}

#[tokio::test]
async fn expired_session_rejects_whiteboard_traffic() {
    let s = stack();
    let room = started_session(&s, "teacher-t").await;
    s.lifecycle.join(room, &student("a")).await.unwrap();

    let t = user("teacher-t");
    s.lifecycle.end(room, &t).await.unwrap();

    let result = s
        .whiteboard
        .publish_update(room, json!({"rev": 1}), user("a"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn teacher_end_announces_to_the_session_channel() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    s.lifecycle.join(session_id, &student("a")).await.unwrap();

    s.lifecycle.end(session_id, &user("teacher-t")).await.unwrap();

    let channel = channels::session_channel(&session_id);
    let ended: Vec<_> = s
        .bus
        .published_on(&channel)
        .into_iter()
        .filter(|m| m.event == events::SESSION_ENDED)
        .collect();
    assert_eq!(ended.len(), 1);
}

// ════════════════════════════════════════════════════════════════════════════
// Scenario D: control handoff round-trip
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scenario_d_spotlight_round_trip() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    s.lifecycle.join(session_id, &student("student-a")).await.unwrap();

    // Teacher's request succeeds and is reflected by every subsequent read.
    s.control
        .request_spotlight(session_id, &user("teacher-t"), user("student-a"))
        .await
        .unwrap();
    let state = s.control.fetch_control_state(session_id).await.unwrap();
    assert_eq!(state.spotlight(), Some(&user("student-a")));

    // The same request by a non-teacher is Forbidden and changes nothing.
    let result = s
        .control
        .request_spotlight(session_id, &user("student-a"), user("student-a"))
        .await;
    assert_eq!(result, Err(ControlError::Forbidden));
    let state = s.control.fetch_control_state(session_id).await.unwrap();
    assert_eq!(state.spotlight(), Some(&user("student-a")));
}

#[tokio::test]
async fn controller_handoff_updates_state_and_broadcasts() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    s.lifecycle.join(session_id, &student("student-a")).await.unwrap();

    let state = s.control.fetch_control_state(session_id).await.unwrap();
    assert_eq!(state.whiteboard_controller(), &user("teacher-t"));

    s.control
        .request_controller_change(session_id, &user("teacher-t"), user("student-a"))
        .await
        .unwrap();

    let state = s.control.fetch_control_state(session_id).await.unwrap();
    assert_eq!(state.whiteboard_controller(), &user("student-a"));
    assert!(s.bus.has_event(events::CONTROLLER_CHANGED));
}

// ════════════════════════════════════════════════════════════════════════════
// Concurrency
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_relays_on_independent_sessions_all_deliver() {
    let s = stack();

    let mut session_ids = Vec::new();
    for i in 0..8 {
        let session_id = started_session(&s, &format!("teacher-{}", i)).await;
        s.lifecycle.join(session_id, &student("p")).await.unwrap();
        s.lifecycle.join(session_id, &student("q")).await.unwrap();
        session_ids.push(session_id);
    }

    let relay = Arc::new(s.relay);

    let relays = session_ids.iter().map(|&session_id| {
        let relay = Arc::clone(&relay);
        async move { relay.relay(signal(session_id, "p", "q")).await }
    });
    let results = futures::future::join_all(relays).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(s.bus.published().len(), 8);
}

#[tokio::test]
async fn join_racing_the_sweep_is_never_lost() {
    let s = stack();
    let session_id = started_session(&s, "teacher-t").await;
    let lifecycle = Arc::clone(&s.lifecycle);

    // An active participant keeps the session alive while sweeps run
    // concurrently with further joins.
    s.lifecycle.join(session_id, &student("keeper")).await.unwrap();

    let sweeps = (0..4).map(|_| {
        let lifecycle = Arc::clone(&lifecycle);
        async move { lifecycle.sweep_expired().await }
    });
    let joins = (0..4).map(|i| {
        let lifecycle = Arc::clone(&lifecycle);
        let caller = student(&format!("joiner-{}", i));
        async move { lifecycle.join(session_id, &caller).await.is_ok() }
    });

    let (cleaned, joined) = tokio::join!(
        futures::future::join_all(sweeps),
        futures::future::join_all(joins)
    );

    assert_eq!(cleaned.into_iter().sum::<usize>(), 0);
    assert!(joined.into_iter().all(|ok| ok));

    let handle = s.registry.get(&session_id).await.unwrap();
    assert_eq!(handle.read().await.participant_count(), 5);
}
