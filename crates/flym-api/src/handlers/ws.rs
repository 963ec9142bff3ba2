//! WebSocket upgrade handler.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use futures::{FutureExt, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use flym_core::error::AppError;
use flym_realtime::connection::{AuthenticatedPeer, UpgradeRejection};
use flym_realtime::message::{ClientMessage, ErrorCode, ServerMessage};
use flym_realtime::{ConnectionHandle, OutboundFrame};

use crate::cookies::ACCESS_COOKIE;
use crate::state::AppState;

/// How long the writer may take to flush a server-initiated close.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Upgrade query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Access token; the `at` cookie is used when absent.
    pub token: Option<String>,
    /// Room to join right after the upgrade.
    #[serde(rename = "chatId", alias = "chat_id")]
    pub chat_id: Option<String>,
}

/// GET /ws?token={jwt}&chatId={room}
///
/// A browser `Origin` outside `server.cors.allowed_origins` is refused with
/// 403 before the upgrade. Otherwise the upgrade always completes;
/// authentication failures are reported with a close code the client can
/// act on.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|o| state.config.server.cors.allows(o));
        if !allowed {
            warn!(origin = ?origin, "WebSocket upgrade from disallowed origin");
            return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
        }
    }

    let cookie_token = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    let outcome = state
        .realtime
        .authenticator
        .authenticate(query.token.as_deref(), cookie_token.as_deref())
        .await;

    ws.on_upgrade(move |socket| async move {
        match outcome {
            Ok(peer) => run_connection(state, peer, query.chat_id, socket).await,
            Err(rejection) => reject(socket, rejection).await,
        }
    })
}

async fn reject(mut socket: WebSocket, rejection: UpgradeRejection) {
    let code = rejection.close_code();
    debug!(code, reason = rejection.reason(), "Closing unauthenticated socket");
    let frame = CloseFrame {
        code,
        reason: rejection.reason().to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

fn to_message(frame: OutboundFrame) -> (Message, bool) {
    match frame {
        OutboundFrame::Text(text) => (Message::Text(text.into()), false),
        OutboundFrame::Ping => (Message::Ping(Bytes::new()), false),
        OutboundFrame::Close { code, reason } => (
            Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
            true,
        ),
    }
}

/// Drives one authenticated socket until either side closes it.
async fn run_connection(
    state: AppState,
    peer: AuthenticatedPeer,
    initial_room: Option<String>,
    socket: WebSocket,
) {
    let manager = state.realtime.connections.clone();
    let (handle, outbound) = manager.register(peer);
    let conn_id = handle.id;

    info!(conn_id = %conn_id, subject = %handle.user_id(), "WebSocket connection established");

    let (ws_tx, mut ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_frames(ws_tx, outbound));

    if let Some(raw) = initial_room {
        join_initial(&state, &handle, &raw).await;
    }

    let cancel = handle.cancellation();
    let mut server_closed = false;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                server_closed = true;
                break;
            }
            next = ws_rx.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                let outcome = AssertUnwindSafe(manager.handle_inbound(&handle, text.as_str()))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        manager.fail(&handle, &e);
                        server_closed = true;
                        break;
                    }
                    Err(_) => {
                        manager.fail(&handle, &AppError::internal("Message handler panicked"));
                        server_closed = true;
                        break;
                    }
                }
            }
            Some(Ok(Message::Binary(_))) => {
                handle.send(&ServerMessage::error(
                    ErrorCode::InvalidMessage,
                    "Binary frames are not supported",
                ));
            }
            Some(Ok(Message::Pong(_))) => handle.record_pong(),
            // Pings are answered by axum.
            Some(Ok(Message::Ping(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    manager.unregister(conn_id);

    if server_closed {
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }
    } else {
        writer.abort();
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

async fn join_initial(state: &AppState, handle: &Arc<ConnectionHandle>, raw: &str) {
    let manager = &state.realtime.connections;
    let Ok(chat_id) = raw.trim().parse::<Uuid>() else {
        handle.send(&ServerMessage::error(
            ErrorCode::InvalidMessage,
            "chatId must be a UUID",
        ));
        return;
    };
    if let Err(e) = manager
        .handle_command(handle, ClientMessage::Join { chat_id })
        .await
    {
        manager.fail(handle, &e);
    }
}

async fn write_frames(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        let (message, last) = to_message(frame);
        if let Err(e) = ws_tx.send(message).await {
            debug!(error = %e, "Socket write failed");
            break;
        }
        if last {
            break;
        }
    }
    if let Err(e) = ws_tx.close().await {
        debug!(error = %e, "Socket close failed");
    }
}
