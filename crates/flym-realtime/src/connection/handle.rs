//! Individual WebSocket connection handle.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flym_entity::Identity;

use crate::message::types::ServerMessage;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// A frame queued for the socket writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Serialized [`ServerMessage`].
    Text(String),
    /// Heartbeat ping.
    Ping,
    /// Close the socket with a code and reason.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing frames to the client plus the
/// identity the connection authenticated as. The room field mirrors the
/// registry's room set and is only written by [`RoomRegistry`].
///
/// [`RoomRegistry`]: crate::channel::RoomRegistry
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Who is connected
    pub identity: Identity,
    /// Room a guest token is scoped to
    pub room_scope: Option<Uuid>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundFrame>,
    room: Mutex<Option<Uuid>>,
    /// Set on pong, cleared by every heartbeat sweep
    alive: AtomicBool,
    open: AtomicBool,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(
        identity: Identity,
        room_scope: Option<Uuid>,
        sender: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            room_scope,
            connected_at: Utc::now(),
            sender,
            room: Mutex::new(None),
            alive: AtomicBool::new(true),
            open: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        }
    }

    /// The connected user or guest id.
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }

    /// Queue a server message. Returns false if the frame was not queued.
    pub fn send(&self, msg: &ServerMessage) -> bool {
        match msg.to_json() {
            Ok(json) => self.send_text(json),
            Err(e) => {
                tracing::error!(conn_id = %self.id, error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Queue an already serialized text frame.
    pub fn send_text(&self, json: String) -> bool {
        self.push(OutboundFrame::Text(json))
    }

    /// Queue a heartbeat ping.
    pub fn ping(&self) -> bool {
        self.push(OutboundFrame::Ping)
    }

    fn push(&self, frame: OutboundFrame) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(_) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                false
            }
        }
    }

    /// Queue a close frame and stop the connection's tasks.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.sender.try_send(OutboundFrame::Close {
                code,
                reason: reason.into(),
            });
        }
        self.cancel.cancel();
    }

    /// Check if the connection still accepts frames
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Mark the connection closed without sending a close frame
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Record a pong response
    pub fn record_pong(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Returns whether a pong arrived since the last call and resets the flag.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    /// Token cancelled when the connection is closed or terminated.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The room this connection is joined to.
    pub fn current_room(&self) -> Option<Uuid> {
        *self.room.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn replace_room(&self, room: Option<Uuid>) -> Option<Uuid> {
        let mut current = self.room.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, room)
    }
}
