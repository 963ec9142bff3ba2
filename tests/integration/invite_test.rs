//! Integration tests for invite links: create, preview, accept.

mod helpers;

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use flym_database::ChatRepository;
use flym_entity::{Identity, Participant};
use flym_realtime::message::ClientMessage;

use helpers::{Backends, TestApp, assert_silent, next_event, next_event_of};

#[tokio::test]
async fn test_direct_invite_flow() {
    let app = TestApp::new().await;
    let host = app.repo.create_user("Wren", "wren@example.com").await;
    let pair = app.login(&host);
    let (_conn, mut host_rx) = app.connect(Identity::from(&host));

    let created = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "direct" })),
            Some(&pair.access_token),
        )
        .await;
    assert_eq!(created.status, 201);
    assert_eq!(created.body["data"]["kind"], "direct");
    let token = created.body["data"]["token"].as_str().unwrap().to_string();

    let preview = app
        .request("GET", &format!("/api/invites/{token}"), None, None)
        .await;
    assert_eq!(preview.status, 200);
    assert_eq!(preview.body["data"]["valid"], true);
    assert_eq!(preview.body["data"]["inviter_name"], "Wren");
    assert_eq!(preview.body["data"]["kind"], "direct");

    let accepted = app
        .request(
            "POST",
            &format!("/api/invites/{token}/accept"),
            Some(json!({ "guestName": "  Xan  " })),
            None,
        )
        .await;
    assert_eq!(accepted.status, 200);
    let data = &accepted.body["data"];
    assert_eq!(data["name"], "Xan");
    let guest_token = data["access_token"].as_str().unwrap().to_string();
    assert_eq!(accepted.cookie("at").as_deref(), Some(guest_token.as_str()));

    let chat_id: Uuid = data["chat_id"].as_str().unwrap().parse().unwrap();
    let guest_id: Uuid = data["guest_id"].as_str().unwrap().parse().unwrap();
    let room = app.repo.find_room(chat_id).await.unwrap().unwrap();
    assert_eq!(room.participant_ids(), vec![host.id, guest_id]);

    let history = app.repo.recent_messages(chat_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_id, guest_id);

    let notice = next_event_of(&mut host_rx, "system").await;
    assert_eq!(notice["payload"]["event"], "invite_accepted");
    assert_eq!(notice["payload"]["data"]["chatId"], chat_id.to_string());
    assert_eq!(notice["payload"]["data"]["guestName"], "Xan");

    // the guest session is scoped to the new room
    let me = app.request("GET", "/api/auth/me", None, Some(&guest_token)).await;
    assert_eq!(me.status, 200);
    assert_eq!(me.body["data"]["kind"], "guest");
    assert_eq!(me.body["data"]["chat_id"], chat_id.to_string());
}

#[tokio::test]
async fn test_acceptance_notifies_inviter_on_other_node_once() {
    let backends = Backends::new();
    let node_a = TestApp::on(&backends).await;
    let node_b = TestApp::on(&backends).await;
    let host = backends.repo.create_user("Ola", "ola@example.com").await;
    let (_conn, mut host_rx) = node_b.connect(Identity::from(&host));

    let pair = node_a.login(&host);
    let created = node_a
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "direct" })),
            Some(&pair.access_token),
        )
        .await;
    let token = created.body["data"]["token"].as_str().unwrap().to_string();
    let accepted = node_a
        .request(
            "POST",
            &format!("/api/invites/{token}/accept"),
            Some(json!({ "guestName": "Pip" })),
            None,
        )
        .await;
    assert_eq!(accepted.status, 200);

    let notice = next_event(&mut host_rx).await;
    assert_eq!(notice["payload"]["event"], "invite_accepted");
    assert_eq!(notice["payload"]["data"]["guestName"], "Pip");
    assert_silent(&mut host_rx, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_group_invite_adds_guest_to_room() {
    let backends = Backends::new();
    let node_a = TestApp::on(&backends).await;
    let node_b = TestApp::on(&backends).await;

    let host = backends.repo.create_user("Yara", "yara@example.com").await;
    let other = backends.repo.create_user("Zed", "zed@example.com").await;
    let room = Uuid::new_v4();
    backends
        .repo
        .create_room(room, &[Participant::user(host.id), Participant::user(other.id)])
        .await
        .unwrap();

    // a member on the other node sees the guest arrive
    let (member, mut member_rx) = node_b.connect(Identity::from(&other));
    node_b.engine().connections.join(&member, room).await.unwrap();
    assert_eq!(next_event(&mut member_rx).await["type"], "room_joined");

    let pair = node_a.login(&host);
    let created = node_a
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "group", "chatId": room })),
            Some(&pair.access_token),
        )
        .await;
    assert_eq!(created.status, 201);
    let token = created.body["data"]["token"].as_str().unwrap().to_string();

    let accepted = node_a
        .request(
            "POST",
            &format!("/api/invites/{token}/accept"),
            Some(json!({ "guest_name": "Guest" })),
            None,
        )
        .await;
    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.body["data"]["chat_id"], room.to_string());
    let guest_id: Uuid = accepted.body["data"]["guest_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let stored = backends.repo.find_room(room).await.unwrap().unwrap();
    assert_eq!(stored.participant_ids(), vec![host.id, other.id, guest_id]);

    let joined = next_event_of(&mut member_rx, "system").await;
    assert_eq!(joined["payload"]["event"], "participant_joined");
    assert_eq!(joined["payload"]["data"]["id"], guest_id.to_string());

    // the guest may join its room and talk there
    let guest_identity = Identity::new(guest_id, "Guest", flym_entity::ParticipantKind::Guest);
    let (guest, mut guest_rx) = node_a.connect_scoped(guest_identity, Some(room));
    node_a
        .engine()
        .connections
        .handle_command(&guest, ClientMessage::Join { chat_id: room })
        .await
        .unwrap();
    assert_eq!(next_event(&mut guest_rx).await["type"], "room_joined");

    node_a
        .engine()
        .connections
        .handle_command(&guest, ClientMessage::Message { text: "hi all".into() })
        .await
        .unwrap();
    let message = next_event_of(&mut member_rx, "message").await;
    assert_eq!(message["payload"]["text"], "hi all");
    assert_eq!(message["payload"]["senderKind"], "guest");
}

#[tokio::test]
async fn test_group_invite_requires_membership() {
    let app = TestApp::new().await;
    let outsider = app.repo.create_user("Abe", "abe@example.com").await;
    let member = app.repo.create_user("Bea", "bea@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(member.id)])
        .await
        .unwrap();
    let pair = app.login(&outsider);

    let response = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "group", "chatId": room })),
            Some(&pair.access_token),
        )
        .await;
    assert_eq!(response.status, 403);
}

#[tokio::test]
async fn test_group_invite_without_room_is_invalid() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Cy", "cy@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "group" })),
            Some(&pair.access_token),
        )
        .await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_guest_cannot_create_invites() {
    let app = TestApp::new().await;
    let host = app.repo.create_user("Dee", "dee@example.com").await;
    let pair = app.login(&host);

    let created = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "direct" })),
            Some(&pair.access_token),
        )
        .await;
    let token = created.body["data"]["token"].as_str().unwrap().to_string();
    let accepted = app
        .request(
            "POST",
            &format!("/api/invites/{token}/accept"),
            Some(json!({ "guestName": "Eve" })),
            None,
        )
        .await;
    let guest_token = accepted.body["data"]["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "direct" })),
            Some(&guest_token),
        )
        .await;
    assert_eq!(response.status, 403);
}

#[tokio::test]
async fn test_invalid_invite_previews_as_invalid() {
    let app = TestApp::new().await;

    let response = app
        .request("GET", "/api/invites/not-a-real-token", None, None)
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["valid"], false);
    assert!(response.body["data"].get("inviter_name").is_none());

    let accept = app
        .request(
            "POST",
            "/api/invites/not-a-real-token/accept",
            Some(json!({ "guestName": "Fin" })),
            None,
        )
        .await;
    assert_eq!(accept.status, 401);
}

#[tokio::test]
async fn test_session_token_is_not_an_invite() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Gil", "gil@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request(
            "GET",
            &format!("/api/invites/{}", pair.access_token),
            None,
            None,
        )
        .await;
    assert_eq!(response.body["data"]["valid"], false);
}

#[tokio::test]
async fn test_guest_name_is_validated() {
    let app = TestApp::new().await;
    let host = app.repo.create_user("Hana", "hana@example.com").await;
    let pair = app.login(&host);
    let created = app
        .request(
            "POST",
            "/api/invites",
            Some(json!({ "kind": "direct" })),
            Some(&pair.access_token),
        )
        .await;
    let token = created.body["data"]["token"].as_str().unwrap().to_string();

    let too_long = "x".repeat(51);
    for name in ["", too_long.as_str()] {
        let response = app
            .request(
                "POST",
                &format!("/api/invites/{token}/accept"),
                Some(json!({ "guestName": name })),
                None,
            )
            .await;
        assert_eq!(response.status, 400, "name {name:?}");
    }
    assert_eq!(app.repo.room_count().await, 0);
}
