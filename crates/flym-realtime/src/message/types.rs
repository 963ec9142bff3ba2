//! Inbound and outbound WebSocket message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flym_core::error::{AppError, ErrorKind};
use flym_entity::{Message, ParticipantKind};

/// Messages sent by the client to the server.
///
/// Unknown `type` tags fail to deserialize and are answered with
/// `INVALID_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a chat room, leaving the current one first.
    #[serde(alias = "join_chat")]
    Join {
        /// Room to join.
        #[serde(rename = "chatId", alias = "chat_id")]
        chat_id: Uuid,
    },
    /// Leave the current room.
    #[serde(alias = "leave_chat")]
    Leave,
    /// Send chat text to the joined room.
    Message {
        /// Message body.
        text: String,
    },
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A chat message in the joined room.
    Message(ChatPayload),
    /// A join request succeeded.
    RoomJoined(RoomJoinedPayload),
    /// A request was rejected.
    Error(ErrorPayload),
    /// An out-of-band event (invite accepted, participant joined, ...).
    System(SystemPayload),
}

/// A persisted chat message as delivered to room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    /// Message id; clients de-duplicate on it.
    pub id: Uuid,
    /// Room the message belongs to.
    pub chat_id: Uuid,
    /// Sender id.
    pub from: Uuid,
    /// Sender display name.
    pub name: String,
    /// Whether the sender is a user or a guest.
    pub sender_kind: ParticipantKind,
    /// Message body.
    pub text: String,
    /// Persistence timestamp.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedPayload {
    pub chat_id: Uuid,
}

/// Error event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

/// System event body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPayload {
    /// Event name, e.g. `invite_accepted`.
    pub event: String,
    /// Event-specific data.
    pub data: serde_json::Value,
}

/// Error codes a client can act on.
///
/// `UNAUTHORIZED` means re-authenticate, `FORBIDDEN` means not allowed
/// here, `TRANSIENT` means try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    InvalidMessage,
    NotJoined,
    Transient,
    Internal,
}

impl ErrorCode {
    /// The code reported for `error`, or `None` when the error must close
    /// the connection instead.
    pub fn for_error(error: &AppError) -> Option<Self> {
        match error.kind {
            ErrorKind::Authentication => Some(Self::Unauthorized),
            ErrorKind::Authorization | ErrorKind::NotFound => Some(Self::Forbidden),
            ErrorKind::Validation | ErrorKind::Conflict => Some(Self::InvalidMessage),
            kind if kind.is_transient() => Some(Self::Transient),
            _ => None,
        }
    }
}

impl ServerMessage {
    /// Builds the room broadcast for a persisted message.
    pub fn chat(message: &Message, sender_name: impl Into<String>) -> Self {
        Self::Message(ChatPayload {
            id: message.id,
            chat_id: message.conversation_id,
            from: message.sender_id,
            name: sender_name.into(),
            sender_kind: message.sender_kind,
            text: message.text.clone(),
            timestamp: message.created_at,
        })
    }

    pub fn room_joined(chat_id: Uuid) -> Self {
        Self::RoomJoined(RoomJoinedPayload { chat_id })
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }

    pub fn system(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self::System(SystemPayload {
            event: event.into(),
            data,
        })
    }

    /// Serializes the message to its JSON text frame.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}
