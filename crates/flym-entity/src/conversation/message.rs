//! Chat message entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::participant::ParticipantKind;

/// A persisted chat message. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Unique message id; clients de-duplicate on it.
    pub id: Uuid,
    /// Room the message belongs to.
    pub conversation_id: Uuid,
    /// Author id.
    pub sender_id: Uuid,
    /// Whether the author is a user or a guest.
    pub sender_kind: ParticipantKind,
    /// Message body.
    pub text: String,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

/// Denormalized preview of the most recent message of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    /// Author id.
    pub sender_id: Uuid,
    /// Message body.
    pub text: String,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            sender_id: message.sender_id,
            text: message.text.clone(),
            timestamp: message.created_at,
        }
    }
}
