//! Integration tests for opening chat rooms over HTTP.

mod helpers;

use serde_json::json;
use uuid::Uuid;

use flym_database::ChatRepository;
use flym_entity::Identity;
use flym_realtime::message::ClientMessage;

use helpers::{TestApp, next_event, next_event_of};

#[tokio::test]
async fn test_open_chat_is_idempotent() {
    let app = TestApp::new().await;
    let ana = app.repo.create_user("Ana", "ana@example.com").await;
    let bo = app.repo.create_user("Bo", "bo@example.com").await;
    let token = app.login(&ana).access_token;

    let first = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [ana.id, bo.id] })),
            Some(&token),
        )
        .await;
    assert_eq!(first.status, 201);
    let chat_id = first.body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(first.body["data"]["participants"][0]["id"], ana.id.to_string());
    assert_eq!(first.body["data"]["participants"][1]["kind"], "user");

    let bo_token = app.login(&bo).access_token;
    let again = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [bo.id, ana.id] })),
            Some(&bo_token),
        )
        .await;
    assert_eq!(again.status, 201);
    assert_eq!(again.body["data"]["id"], chat_id.as_str());
    assert_eq!(app.repo.room_count().await, 1);
}

#[tokio::test]
async fn test_open_chat_requires_caller_as_member() {
    let app = TestApp::new().await;
    let ana = app.repo.create_user("Ana", "ana@example.com").await;
    let bo = app.repo.create_user("Bo", "bo@example.com").await;
    let cy = app.repo.create_user("Cy", "cy@example.com").await;
    let token = app.login(&cy).access_token;

    let response = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [ana.id, bo.id] })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, 403);
    assert_eq!(app.repo.room_count().await, 0);
}

#[tokio::test]
async fn test_open_chat_rejects_unknown_and_anonymous() {
    let app = TestApp::new().await;
    let ana = app.repo.create_user("Ana", "ana@example.com").await;
    let token = app.login(&ana).access_token;

    let unknown = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [ana.id, Uuid::new_v4()] })),
            Some(&token),
        )
        .await;
    assert_eq!(unknown.status, 404);

    let alone = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [ana.id] })),
            Some(&token),
        )
        .await;
    assert_eq!(alone.status, 400);

    let anonymous = app
        .request("POST", "/api/chats", Some(json!({ "participants": [ana.id] })), None)
        .await;
    assert_eq!(anonymous.status, 401);
}

#[tokio::test]
async fn test_guest_cannot_open_chats() {
    let app = TestApp::new().await;
    let host = app.repo.create_user("Dee", "dee@example.com").await;
    let token = app.login(&host).access_token;
    let created = app
        .request("POST", "/api/invites", Some(json!({ "kind": "direct" })), Some(&token))
        .await;
    let invite = created.body["data"]["token"].as_str().unwrap().to_string();
    let accepted = app
        .request(
            "POST",
            &format!("/api/invites/{invite}/accept"),
            Some(json!({ "guestName": "Eve" })),
            None,
        )
        .await;
    let guest_id = accepted.body["data"]["guest_id"].as_str().unwrap().to_string();
    let guest_token = accepted.body["data"]["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [guest_id, host.id] })),
            Some(&guest_token),
        )
        .await;
    assert_eq!(response.status, 403);
}

#[tokio::test]
async fn test_opened_chat_can_be_joined_and_used() {
    let app = TestApp::new().await;
    let ana = app.register("Ana", "ana@example.com", "pw-ana").await;
    let bo = app.repo.create_user("Bo", "bo@example.com").await;

    let login = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "ana@example.com", "password": "pw-ana" })),
            None,
        )
        .await;
    assert_eq!(login.status, 200);
    let token = login.body["data"]["access_token"].as_str().unwrap().to_string();

    let opened = app
        .request(
            "POST",
            "/api/chats",
            Some(json!({ "participants": [ana.id, bo.id] })),
            Some(&token),
        )
        .await;
    let chat_id: Uuid = opened.body["data"]["id"].as_str().unwrap().parse().unwrap();

    let (a, mut a_rx) = app.connect(Identity::from(&ana));
    let (b, mut b_rx) = app.connect(Identity::from(&bo));
    for (conn, rx) in [(&a, &mut a_rx), (&b, &mut b_rx)] {
        app.engine()
            .connections
            .handle_command(conn, ClientMessage::Join { chat_id })
            .await
            .unwrap();
        assert_eq!(next_event(rx).await["type"], "room_joined");
    }

    app.engine()
        .connections
        .handle_command(&a, ClientMessage::Message { text: "hey".into() })
        .await
        .unwrap();
    let received = next_event_of(&mut b_rx, "message").await;
    assert_eq!(received["payload"]["text"], "hey");

    let history = app.repo.recent_messages(chat_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}
