//! End-to-end WebSocket tests against a served router.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use flym_database::ChatRepository;
use flym_entity::Participant;

use helpers::TestApp;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn open(addr: SocketAddr, query: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws{query}"))
        .await
        .expect("websocket handshake");
    socket
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn close_code(socket: &mut Socket) -> u16 {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for close")
            .expect("socket ended without a close frame")
            .expect("socket error");
        if let Message::Close(frame) = message {
            return frame.map(|f| u16::from(f.code)).unwrap_or(1005);
        }
    }
}

#[tokio::test]
async fn test_missing_token_closes_with_4000() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let mut socket = open(addr, "").await;
    assert_eq!(close_code(&mut socket).await, 4000);
    assert_eq!(app.engine().registry.connection_count(), 0);
}

#[tokio::test]
async fn test_invalid_token_closes_with_4001() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let mut socket = open(addr, "?token=garbage").await;
    assert_eq!(close_code(&mut socket).await, 4001);
}

#[tokio::test]
async fn test_revoked_token_closes_with_4001() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let user = app.repo.create_user("Ivy", "ivy@example.com").await;
    let pair = app.login(&user);
    app.state
        .sessions
        .logout(Some(&pair.access_token), None)
        .await
        .unwrap();

    let mut socket = open(addr, &format!("?token={}", pair.access_token)).await;
    assert_eq!(close_code(&mut socket).await, 4001);
}

#[tokio::test]
async fn test_foreign_origin_is_refused_before_upgrade() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let user = app.repo.create_user("Mo", "mo@example.com").await;
    let token = app.login(&user).access_token;
    let url = format!("ws://{addr}/ws?token={token}");

    let mut request = url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("origin", "https://evil.example".parse().unwrap());
    match connect_async(request).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 403);
        }
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("upgrade from a foreign origin succeeded"),
    }
    assert_eq!(app.engine().registry.connection_count(), 0);

    let mut request = url.as_str().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("origin", "http://localhost:3000".parse().unwrap());
    let (mut socket, _) = connect_async(request).await.expect("allowed origin");
    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_revocation_store_outage_closes_with_4002() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let user = app.repo.create_user("Lou", "lou@example.com").await;
    let token = app.login(&user).access_token;

    app.cache_switch.set_unavailable(true);
    let mut socket = open(addr, &format!("?token={token}")).await;
    assert_eq!(close_code(&mut socket).await, 4002);
    assert_eq!(app.engine().registry.connection_count(), 0);
}

#[tokio::test]
async fn test_chat_between_two_sockets() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let alice = app.repo.create_user("Alice", "alice@example.com").await;
    let bob = app.repo.create_user("Bob", "bob@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(alice.id), Participant::user(bob.id)])
        .await
        .unwrap();

    // Alice joins through the query string, Bob with a join frame.
    let alice_token = app.login(&alice).access_token;
    let mut a = open(addr, &format!("?token={alice_token}&chatId={room}")).await;
    let joined = next_json(&mut a).await;
    assert_eq!(joined["type"], "room_joined");
    assert_eq!(joined["payload"]["chatId"], room.to_string());

    let bob_token = app.login(&bob).access_token;
    let mut b = open(addr, &format!("?token={bob_token}")).await;
    b.send(Message::text(format!(r#"{{"type":"join","chatId":"{room}"}}"#)))
        .await
        .unwrap();
    assert_eq!(next_json(&mut b).await["type"], "room_joined");

    a.send(Message::text(r#"{"type":"message","text":"  hello bob  "}"#))
        .await
        .unwrap();

    let received = next_json(&mut b).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["payload"]["text"], "hello bob");
    assert_eq!(received["payload"]["from"], alice.id.to_string());
    assert_eq!(received["payload"]["name"], "Alice");

    let echoed = next_json(&mut a).await;
    assert_eq!(echoed["payload"]["id"], received["payload"]["id"]);

    b.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.engine().registry.room_size(room), 1);
}

#[tokio::test]
async fn test_join_forbidden_room_over_socket() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let owner = app.repo.create_user("Owner", "owner@example.com").await;
    let stranger = app.repo.create_user("Stranger", "stranger@example.com").await;
    let room = Uuid::new_v4();
    app.repo
        .create_room(room, &[Participant::user(owner.id)])
        .await
        .unwrap();

    let token = app.login(&stranger).access_token;
    let mut socket = open(addr, &format!("?token={token}&chatId={room}")).await;
    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["payload"]["code"], "FORBIDDEN");

    // the socket stays usable
    socket
        .send(Message::text(r#"{"type":"message","text":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["payload"]["code"], "NOT_JOINED");
}

#[tokio::test]
async fn test_invalid_frames_get_error_events() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let user = app.repo.create_user("Jay", "jay@example.com").await;
    let token = app.login(&user).access_token;

    let mut socket = open(addr, &format!("?token={token}&chatId=not-a-uuid")).await;
    assert_eq!(next_json(&mut socket).await["payload"]["code"], "INVALID_MESSAGE");

    socket.send(Message::text("nonsense")).await.unwrap();
    assert_eq!(next_json(&mut socket).await["payload"]["code"], "INVALID_MESSAGE");

    socket
        .send(Message::binary(vec![1u8, 2, 3]))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["payload"]["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn test_shutdown_closes_sockets_with_going_away() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let user = app.repo.create_user("Kai", "kai@example.com").await;
    let token = app.login(&user).access_token;

    let mut socket = open(addr, &format!("?token={token}")).await;
    // wait until the server has registered the connection
    for _ in 0..50 {
        if app.engine().registry.connection_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    app.engine().shutdown();
    assert_eq!(close_code(&mut socket).await, 1001);
}
