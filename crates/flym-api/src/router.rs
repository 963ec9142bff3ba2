//! Route definitions for the Flym HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket upgrade lives at
//! `/ws`.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route, threading `AppState` through
/// `.with_state(state)`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(auth_routes())
        .merge(chat_routes())
        .merge(invite_routes())
        .merge(health_routes());

    let ws_routes = Router::new().route("/ws", get(handlers::ws::ws_upgrade));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .with_state(state)
}

/// Session endpoints: login, refresh, logout, me
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
}

/// Chat rooms
fn chat_routes() -> Router<AppState> {
    Router::new().route("/chats", post(handlers::chats::create_chat))
}

/// Invite creation, preview and acceptance
fn invite_routes() -> Router<AppState> {
    Router::new()
        .route("/invites", post(handlers::invite::create_invite))
        .route("/invites/{token}", get(handlers::invite::preview_invite))
        .route(
            "/invites/{token}/accept",
            post(handlers::invite::accept_invite),
        )
}

/// Health checks
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}
