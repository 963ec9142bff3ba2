//! Conversation (room) entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::LastMessage;
use super::participant::Participant;

/// A room: an ordered participant list plus a last-message cache.
///
/// Messages themselves are stored separately and read through the
/// repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique room identifier.
    pub id: Uuid,
    /// Participants in admission order.
    pub participants: Vec<Participant>,
    /// Most recent message, if any.
    pub last_message: Option<LastMessage>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// When the room was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether `id` appears in the participant list (exact match).
    pub fn has_participant(&self, id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    /// Participant ids in order.
    pub fn participant_ids(&self) -> Vec<Uuid> {
        self.participants.iter().map(|p| p.id).collect()
    }

    /// Whether the participant set equals `ids`, ignoring order.
    pub fn has_exact_participants(&self, ids: &[Uuid]) -> bool {
        let mut mine = self.participant_ids();
        let mut theirs = ids.to_vec();
        mine.sort_unstable();
        mine.dedup();
        theirs.sort_unstable();
        theirs.dedup();
        mine == theirs
    }
}
