//! Integration tests for room membership, cross-node fan-out and heartbeat.

mod helpers;

use std::time::Duration;

use uuid::Uuid;

use flym_database::ChatRepository;
use flym_entity::{Identity, Participant, ParticipantKind};
use flym_realtime::OutboundFrame;
use flym_realtime::message::ClientMessage;

use helpers::{Backends, TestApp, assert_silent, next_event, next_event_of};

#[tokio::test]
async fn test_message_reaches_member_on_other_node() {
    let backends = Backends::new();
    let node_a = TestApp::on(&backends).await;
    let node_b = TestApp::on(&backends).await;

    let alice = backends.repo.create_user("Alice", "alice@example.com").await;
    let bob = backends.repo.create_user("Bob", "bob@example.com").await;
    let room = Uuid::new_v4();
    backends
        .repo
        .create_room(room, &[Participant::user(alice.id), Participant::user(bob.id)])
        .await
        .unwrap();

    let (a, mut a_rx) = node_a.connect(Identity::from(&alice));
    let (b, mut b_rx) = node_b.connect(Identity::from(&bob));

    node_a.engine().connections.join(&a, room).await.unwrap();
    node_b.engine().connections.join(&b, room).await.unwrap();
    assert_eq!(next_event(&mut a_rx).await["type"], "room_joined");
    assert_eq!(next_event(&mut b_rx).await["type"], "room_joined");

    node_a
        .engine()
        .connections
        .handle_inbound(&a, r#"{"type":"message","text":"hello"}"#)
        .await
        .unwrap();

    let received = next_event_of(&mut b_rx, "message").await;
    assert_eq!(received["payload"]["text"], "hello");
    assert_eq!(received["payload"]["from"], alice.id.to_string());
    assert_eq!(received["payload"]["chatId"], room.to_string());
    assert_eq!(received["payload"]["senderKind"], "user");

    // the sender sees its own message through the same path
    let echoed = next_event_of(&mut a_rx, "message").await;
    assert_eq!(echoed["payload"]["id"], received["payload"]["id"]);

    let history = backends.repo.recent_messages(room, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_non_participant_join_is_rejected() {
    let app = TestApp::new().await;
    let carol = app.repo.create_user("Carol", "carol@example.com").await;
    let dave = app.repo.create_user("Dave", "dave@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(dave.id)])
        .await
        .unwrap();

    let (c, mut c_rx) = app.connect(Identity::from(&carol));
    app.engine()
        .connections
        .handle_command(&c, ClientMessage::Join { chat_id: room })
        .await
        .unwrap();

    let event = next_event(&mut c_rx).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["payload"]["code"], "FORBIDDEN");

    let registry = &app.engine().registry;
    assert!(!registry.is_member(room, c.id));
    assert_eq!(registry.room_size(room), 0);
    assert!(!app.engine().bridge.is_subscribed(room));
    assert!(c.is_open());
    assert_eq!(app.engine().metrics.snapshot().joins_denied, 1);
}

#[tokio::test]
async fn test_unknown_room_is_forbidden() {
    let app = TestApp::new().await;
    let erin = app.repo.create_user("Erin", "erin@example.com").await;
    let (e, mut e_rx) = app.connect(Identity::from(&erin));

    app.engine()
        .connections
        .handle_command(&e, ClientMessage::Join { chat_id: Uuid::new_v4() })
        .await
        .unwrap();

    assert_eq!(next_event(&mut e_rx).await["payload"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_last_member_disconnect_releases_room() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Fay", "fay@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(user.id)])
        .await
        .unwrap();

    let (first, _first_rx) = app.connect(Identity::from(&user));
    let (second, _second_rx) = app.connect(Identity::from(&user));
    let connections = &app.engine().connections;
    connections.join(&first, room).await.unwrap();
    connections.join(&second, room).await.unwrap();
    assert_eq!(app.engine().registry.room_size(room), 2);

    connections.unregister(first.id);
    assert_eq!(app.engine().registry.room_size(room), 1);
    assert!(app.engine().bridge.is_subscribed(room));

    connections.unregister(second.id);
    assert_eq!(app.engine().registry.room_size(room), 0);
    assert_eq!(app.engine().registry.room_count(), 0);
    assert!(!app.engine().bridge.is_subscribed(room));
}

#[tokio::test]
async fn test_leave_is_idempotent() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Gus", "gus@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(user.id)])
        .await
        .unwrap();

    let (conn, mut rx) = app.connect(Identity::from(&user));
    let connections = &app.engine().connections;

    connections
        .handle_command(&conn, ClientMessage::Leave)
        .await
        .unwrap();
    connections.join(&conn, room).await.unwrap();
    assert_eq!(next_event(&mut rx).await["type"], "room_joined");

    for _ in 0..2 {
        connections
            .handle_command(&conn, ClientMessage::Leave)
            .await
            .unwrap();
    }
    assert_eq!(conn.current_room(), None);
    assert!(!app.engine().bridge.is_subscribed(room));
    assert_silent(&mut rx, Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_same_sender_order_is_preserved_across_nodes() {
    let backends = Backends::new();
    let node_a = TestApp::on(&backends).await;
    let node_b = TestApp::on(&backends).await;

    let alice = backends.repo.create_user("Alice", "alice@example.com").await;
    let bob = backends.repo.create_user("Bob", "bob@example.com").await;
    let room = Uuid::new_v4();
    backends
        .repo
        .create_room(room, &[Participant::user(alice.id), Participant::user(bob.id)])
        .await
        .unwrap();

    let (a, _a_rx) = node_a.connect(Identity::from(&alice));
    let (b, mut b_rx) = node_b.connect(Identity::from(&bob));
    node_a.engine().connections.join(&a, room).await.unwrap();
    node_b.engine().connections.join(&b, room).await.unwrap();

    for i in 0..20 {
        let frame = format!(r#"{{"type":"message","text":"m{i}"}}"#);
        node_a
            .engine()
            .connections
            .handle_inbound(&a, &frame)
            .await
            .unwrap();
    }

    for i in 0..20 {
        let event = next_event_of(&mut b_rx, "message").await;
        assert_eq!(event["payload"]["text"], format!("m{i}"));
    }
}

#[tokio::test]
async fn test_storage_outage_is_reported_as_transient() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Hal", "hal@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(user.id)])
        .await
        .unwrap();

    let (conn, mut rx) = app.connect(Identity::from(&user));
    app.engine().connections.join(&conn, room).await.unwrap();
    next_event(&mut rx).await;

    app.repo.set_unavailable(true);
    app.engine()
        .connections
        .handle_inbound(&conn, r#"{"type":"message","text":"lost?"}"#)
        .await
        .unwrap();

    let event = next_event(&mut rx).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["payload"]["code"], "TRANSIENT");
    assert!(conn.is_open());
    assert!(app.engine().registry.is_member(room, conn.id));
}

#[tokio::test]
async fn test_malformed_and_unjoined_messages() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Ida", "ida@example.com").await;
    let (conn, mut rx) = app.connect(Identity::from(&user));
    let connections = &app.engine().connections;

    connections.handle_inbound(&conn, "{not json").await.unwrap();
    assert_eq!(next_event(&mut rx).await["payload"]["code"], "INVALID_MESSAGE");

    connections
        .handle_inbound(&conn, r#"{"type":"dance"}"#)
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await["payload"]["code"], "INVALID_MESSAGE");

    connections
        .handle_inbound(&conn, r#"{"type":"message","text":"anyone?"}"#)
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await["payload"]["code"], "NOT_JOINED");

    assert!(conn.is_open());
}

#[tokio::test]
async fn test_guest_cannot_join_outside_its_room() {
    let app = TestApp::new().await;
    let host = app.repo.create_user("Jo", "jo@example.com").await;
    let guest = Identity::new(Uuid::new_v4(), "Visitor", ParticipantKind::Guest);
    let own_room = Uuid::new_v4();
    let other_room = Uuid::new_v4();
    app.repo
        .create_room(own_room, &[Participant::user(host.id), Participant::guest(guest.id)])
        .await
        .unwrap();
    app.repo
        .create_room(other_room, &[Participant::user(host.id), Participant::guest(guest.id)])
        .await
        .unwrap();

    let (conn, mut rx) = app.connect_scoped(guest, Some(own_room));
    let connections = &app.engine().connections;

    connections
        .handle_command(&conn, ClientMessage::Join { chat_id: other_room })
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await["payload"]["code"], "FORBIDDEN");

    connections
        .handle_command(&conn, ClientMessage::Join { chat_id: own_room })
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await["type"], "room_joined");
}

#[tokio::test]
async fn test_heartbeat_terminates_silent_connection() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Kim", "kim@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(user.id)])
        .await
        .unwrap();

    let (silent, _silent_rx) = app.connect(Identity::from(&user));
    let (lively, _lively_rx) = app.connect(Identity::from(&user));
    app.engine().connections.join(&silent, room).await.unwrap();

    // first cycle pings everyone; only one answers
    assert_eq!(app.engine().heartbeat.sweep(), 0);
    lively.record_pong();

    assert_eq!(app.engine().heartbeat.sweep(), 1);
    let registry = &app.engine().registry;
    assert!(registry.get(silent.id).is_none());
    assert!(registry.get(lively.id).is_some());
    assert_eq!(registry.room_size(room), 0);
    assert!(registry.user_connections(user.id).iter().all(|h| h.id != silent.id));
    assert!(!app.engine().bridge.is_subscribed(room));
    assert_eq!(app.engine().metrics.snapshot().heartbeat_terminations, 1);
}

#[tokio::test]
async fn test_shutdown_closes_every_connection() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Lee", "lee@example.com").await;
    let (conn, mut rx) = app.connect(Identity::from(&user));

    app.engine().shutdown();

    assert!(!conn.is_open());
    assert_eq!(app.engine().registry.connection_count(), 0);
    let mut closed = false;
    while let Ok(frame) = rx.try_recv() {
        if let OutboundFrame::Close { code, .. } = frame {
            assert_eq!(code, 1001);
            closed = true;
        }
    }
    assert!(closed);
}
