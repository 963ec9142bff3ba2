//! Connection manager: handles connection lifecycle (register, join, message
//! routing, removal).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use flym_core::config::RealtimeConfig;
use flym_core::error::AppError;
use flym_core::result::AppResult;
use flym_database::ChatRepository;

use crate::access::AccessGate;
use crate::bridge::PubSubBridge;
use crate::channel::RoomRegistry;
use crate::message::types::{ClientMessage, ErrorCode, ServerMessage};
use crate::message::validator;
use crate::metrics::RealtimeMetrics;

use super::authenticator::{AuthenticatedPeer, CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR};
use super::handle::{ConnectionHandle, ConnectionId, OutboundFrame};

/// Owns the per-connection state machine.
///
/// A registered connection is reachable by direct notifications right
/// away; joining a room passes the [`AccessGate`] first. Failures of a
/// single request are answered with an error event and leave the
/// connection open; only internal errors are returned to the caller,
/// which closes the socket.
#[derive(Debug)]
pub struct ConnectionManager {
    registry: Arc<RoomRegistry>,
    gate: AccessGate,
    bridge: Arc<PubSubBridge>,
    repo: Arc<dyn ChatRepository>,
    metrics: Arc<RealtimeMetrics>,
    config: RealtimeConfig,
}

impl ConnectionManager {
    pub fn new(
        config: RealtimeConfig,
        registry: Arc<RoomRegistry>,
        bridge: Arc<PubSubBridge>,
        repo: Arc<dyn ChatRepository>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            gate: AccessGate::new(repo.clone(), config.operation_timeout()),
            registry,
            bridge,
            repo,
            metrics,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Registers a new authenticated connection.
    ///
    /// Returns the connection handle and a receiver for outbound frames.
    pub fn register(
        &self,
        peer: AuthenticatedPeer,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let handle = Arc::new(ConnectionHandle::new(peer.identity, peer.room_scope, tx));

        self.registry.register(handle.clone());
        self.metrics.connection_opened();

        info!(
            conn_id = %handle.id,
            subject = %handle.user_id(),
            kind = %handle.identity.kind,
            "WebSocket connection registered"
        );

        (handle, rx)
    }

    /// Handle one inbound text frame.
    pub async fn handle_inbound(&self, handle: &Arc<ConnectionHandle>, raw: &str) -> AppResult<()> {
        self.metrics.inc_received();
        match validator::parse_inbound(raw, &self.config) {
            Ok(message) => self.handle_command(handle, message).await,
            Err(e) => self.report(handle, e),
        }
    }

    /// Run a parsed client command, answering request-level failures with
    /// an error event.
    pub async fn handle_command(
        &self,
        handle: &Arc<ConnectionHandle>,
        message: ClientMessage,
    ) -> AppResult<()> {
        let result = match message {
            ClientMessage::Join { chat_id } => self.join(handle, chat_id).await,
            ClientMessage::Leave => {
                self.leave(handle);
                Ok(())
            }
            ClientMessage::Message { text } => self.send_chat(handle, text).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.report(handle, e),
        }
    }

    fn report(&self, handle: &ConnectionHandle, err: AppError) -> AppResult<()> {
        match ErrorCode::for_error(&err) {
            Some(code) => {
                debug!(conn_id = %handle.id, ?code, error = %err, "Request rejected");
                let message = if code == ErrorCode::Transient {
                    "Temporarily unavailable, please retry".to_string()
                } else {
                    err.message
                };
                handle.send(&ServerMessage::error(code, message));
                Ok(())
            }
            None => Err(err),
        }
    }

    /// Join `room_id` after the access check, leaving the current room.
    ///
    /// A denied join leaves any current membership untouched.
    pub async fn join(&self, handle: &Arc<ConnectionHandle>, room_id: Uuid) -> AppResult<()> {
        if !self
            .gate
            .can_join(&handle.identity, handle.room_scope, room_id)
            .await?
        {
            self.metrics.inc_join_denied();
            warn!(conn_id = %handle.id, subject = %handle.user_id(), %room_id, "Join denied");
            return Err(AppError::authorization("You are not a participant of this chat"));
        }

        let Some(outcome) = self.registry.join(handle.id, room_id) else {
            return Err(AppError::internal("Connection is no longer registered"));
        };
        if let Some(vacated) = outcome.vacated {
            self.bridge.release_room_subscription(vacated);
        }

        if let Err(e) = self.bridge.ensure_room_subscription(room_id).await {
            self.leave(handle);
            return Err(e);
        }

        debug!(conn_id = %handle.id, %room_id, previous = ?outcome.previous, "Joined room");
        handle.send(&ServerMessage::room_joined(room_id));
        Ok(())
    }

    /// Leave the current room. A no-op outside any room.
    pub fn leave(&self, handle: &ConnectionHandle) {
        if let Some(left) = self.registry.leave(handle.id) {
            debug!(conn_id = %handle.id, room_id = %left.room, "Left room");
            if left.vacated {
                self.bridge.release_room_subscription(left.room);
            }
        }
    }

    /// Persist chat text, then publish it to the room.
    ///
    /// If the publish fails after the write, the client is still told the
    /// send failed; the message stays in history.
    async fn send_chat(&self, handle: &ConnectionHandle, text: String) -> AppResult<()> {
        let Some(room_id) = handle.current_room() else {
            handle.send(&ServerMessage::error(
                ErrorCode::NotJoined,
                "Join a chat before sending messages",
            ));
            return Ok(());
        };

        let message = tokio::time::timeout(
            self.config.operation_timeout(),
            self.repo.append_message(room_id, handle.user_id(), &text),
        )
        .await??;

        self.bridge
            .publish_to_room(room_id, ServerMessage::chat(&message, &handle.identity.name))
            .await
    }

    /// Remove a closed connection from every index.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let Some(removal) = self.registry.unregister(conn_id) else {
            return;
        };
        removal.handle.mark_closed();
        self.metrics.connection_closed();
        if let Some(room_id) = removal.vacated_room {
            self.bridge.release_room_subscription(room_id);
        }
        info!(
            conn_id = %conn_id,
            subject = %removal.handle.user_id(),
            "WebSocket connection removed"
        );
    }

    /// Close a connection with `code` and remove it.
    pub fn terminate(&self, handle: &ConnectionHandle, code: u16, reason: &str) {
        handle.close(code, reason);
        self.unregister(handle.id);
    }

    /// Close every connection, used at shutdown.
    pub fn close_all(&self) {
        let connections = self.registry.all_connections();
        if connections.is_empty() {
            return;
        }
        info!(count = connections.len(), "Closing all WebSocket connections");
        for handle in connections {
            self.terminate(&handle, CLOSE_GOING_AWAY, "Server shutting down");
        }
    }

    /// Log and close after an internal error.
    pub fn fail(&self, handle: &ConnectionHandle, err: &AppError) {
        error!(conn_id = %handle.id, error = %err, "Closing connection after internal error");
        self.terminate(handle, CLOSE_INTERNAL_ERROR, "Internal error");
    }
}
