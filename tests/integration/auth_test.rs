//! Integration tests for session tokens: refresh rotation, logout and
//! revocation.

mod helpers;

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use flym_auth::{Claims, TokenSubject, TokenType};

use helpers::TestApp;

fn cookie_header(pairs: &[(&str, &str)]) -> (String, String) {
    let value = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ");
    ("cookie".to_string(), value)
}

#[tokio::test]
async fn test_me_returns_caller() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Mia", "mia@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["id"], user.id.to_string());
    assert_eq!(response.body["data"]["kind"], "user");
    assert!(response.body["data"].get("chat_id").is_none());
}

#[tokio::test]
async fn test_access_cookie_authenticates() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Ned", "ned@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request_with_headers(
            "GET",
            "/api/auth/me",
            None,
            &[cookie_header(&[("at", &pair.access_token)])],
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["name"], "Ned");
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Oli", "oli@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request("GET", "/api/auth/me", None, Some(&pair.refresh_token))
        .await;
    assert_eq!(response.status, 401);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new().await;
    let subject = TokenSubject::user(Uuid::new_v4(), "Pat");
    let claims = Claims::new(&subject, TokenType::Access, Duration::seconds(-30));
    let token = app.state.sessions.encoder().sign(&claims).unwrap();

    let response = app.request("GET", "/api/auth/me", None, Some(&token)).await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Quin", "quin@example.com").await;
    let mut token = app.login(&user).access_token;
    token.push('x');

    let response = app.request("GET", "/api/auth/me", None, Some(&token)).await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Rae", "rae@example.com").await;
    let pair = app.login(&user);

    let ok = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(ok.status, 200);

    let claims = app.state.sessions.authenticate(&pair.access_token).await.unwrap();
    app.state
        .sessions
        .revocation()
        .revoke_claims(&claims)
        .await
        .unwrap();

    let rejected = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(rejected.status, 401);
}

#[tokio::test]
async fn test_refresh_rotates_and_revokes_old_token() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Sam", "sam@example.com").await;
    let pair = app.login(&user);

    let first = app
        .request_with_headers(
            "POST",
            "/api/auth/refresh",
            None,
            &[cookie_header(&[("rt", &pair.refresh_token)])],
        )
        .await;
    assert_eq!(first.status, 200);
    let new_access = first.body["data"]["access_token"].as_str().unwrap().to_string();
    let new_refresh = first.body["data"]["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, pair.refresh_token);
    assert_eq!(first.cookie("at").as_deref(), Some(new_access.as_str()));
    assert_eq!(first.cookie("rt").as_deref(), Some(new_refresh.as_str()));

    // the old refresh token is single-use
    let replay = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            None,
        )
        .await;
    assert_eq!(replay.status, 401);

    let me = app
        .request("GET", "/api/auth/me", None, Some(&new_access))
        .await;
    assert_eq!(me.status, 200);
}

#[tokio::test]
async fn test_refresh_without_token_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app.request("POST", "/api/auth/refresh", None, None).await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_pwa_refresh_cookie_is_persistent() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Tess", "tess@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request_with_headers(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            &[("x-client-device".to_string(), "mobile-pwa".to_string())],
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["client_type"], "pwa");

    let rt = response
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("rt="))
        .unwrap();
    assert!(rt.contains("Max-Age="));
    assert!(rt.contains("HttpOnly"));
}

#[tokio::test]
async fn test_logout_revokes_and_clears_cookies() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Uma", "uma@example.com").await;
    let pair = app.login(&user);

    let response = app
        .request_with_headers(
            "POST",
            "/api/auth/logout",
            None,
            &[cookie_header(&[
                ("at", &pair.access_token),
                ("rt", &pair.refresh_token),
            ])],
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.cookie("at").as_deref(), Some(""));
    assert_eq!(response.cookie("rt").as_deref(), Some(""));

    let me = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(me.status, 401);

    let refresh = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            None,
        )
        .await;
    assert_eq!(refresh.status, 401);
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
    let app = TestApp::new().await;
    let response = app.request("POST", "/api/auth/logout", None, None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["success"], true);
}

#[tokio::test]
async fn test_guest_token_header_authenticates() {
    let app = TestApp::new().await;
    let room = Uuid::new_v4();
    let subject = TokenSubject::guest(Uuid::new_v4(), "Visitor", room, Uuid::new_v4());
    let issued = app.state.sessions.issue_guest_token(&subject).unwrap();

    let response = app
        .request_with_headers(
            "GET",
            "/api/auth/me",
            None,
            &[("x-guest-token".to_string(), issued.token.clone())],
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["kind"], "guest");
    assert_eq!(response.body["data"]["chat_id"], room.to_string());
}

#[tokio::test]
async fn test_revocation_is_shared_between_nodes() {
    let backends = helpers::Backends::new();
    let node_a = TestApp::on(&backends).await;
    let node_b = TestApp::on(&backends).await;
    let user = backends.repo.create_user("Vic", "vic@example.com").await;
    let pair = node_a.login(&user);

    node_a
        .request_with_headers(
            "POST",
            "/api/auth/logout",
            None,
            &[cookie_header(&[("at", &pair.access_token)])],
        )
        .await;

    let response = node_b
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_revocation_store_outage_fails_closed() {
    let app = TestApp::new().await;
    let user = app.repo.create_user("Wes", "wes@example.com").await;
    let pair = app.login(&user);

    app.cache_switch.set_unavailable(true);
    let response = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(response.status, 503);
    assert_eq!(response.body["success"], false);

    let refresh = app
        .request(
            "POST",
            "/api/auth/refresh",
            Some(json!({ "refresh_token": pair.refresh_token })),
            None,
        )
        .await;
    assert_eq!(refresh.status, 503);

    app.cache_switch.set_unavailable(false);
    let response = app
        .request("GET", "/api/auth/me", None, Some(&pair.access_token))
        .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_login_sets_cookies_and_authenticates() {
    let app = TestApp::new().await;
    let user = app.register("Rae", "rae@example.com", "correct horse").await;

    let response = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "RAE@example.com", "password": "correct horse" })),
            None,
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["user"]["id"], user.id.to_string());
    assert!(response.body["data"]["user"].get("password_hash").is_none());
    assert_eq!(response.body["data"]["client_type"], "web");

    let access = response.cookie("at").expect("access cookie");
    assert!(response.cookie("rt").is_some());
    assert_eq!(
        response.body["data"]["access_token"].as_str(),
        Some(access.as_str())
    );

    let me = app
        .request_with_headers("GET", "/api/auth/me", None, &[cookie_header(&[("at", &access)])])
        .await;
    assert_eq!(me.status, 200);
    assert_eq!(me.body["data"]["name"], "Rae");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_alike() {
    let app = TestApp::new().await;
    app.register("Sol", "sol@example.com", "right").await;
    app.repo.create_user("Tam", "tam@example.com").await;

    for (email, password) in [
        ("sol@example.com", "wrong"),
        ("nobody@example.com", "right"),
        ("tam@example.com", "anything"),
    ] {
        let response = app
            .request(
                "POST",
                "/api/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status, 401, "{email}");
        assert!(response.cookie("at").is_none());
    }

    let malformed = app
        .request(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "not-an-email", "password": "x" })),
            None,
        )
        .await;
    assert_eq!(malformed.status, 400);
}

#[tokio::test]
async fn test_pwa_login_gets_pwa_session() {
    let app = TestApp::new().await;
    app.register("Uma", "uma@example.com", "pw").await;

    let response = app
        .request_with_headers(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "uma@example.com", "password": "pw" })),
            &[("x-client-device".to_string(), "mobile-pwa".to_string())],
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["client_type"], "pwa");
}
