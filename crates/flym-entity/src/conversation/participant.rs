//! Room participants.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whether a participant id refers to a registered user or a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participant_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// A registered account.
    User,
    /// An ephemeral guest identity.
    Guest,
}

impl ParticipantKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a room's ordered participant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Participant {
    /// User or guest id.
    #[sqlx(rename = "participant_id")]
    pub id: Uuid,
    /// Kind of identity behind `id`.
    pub kind: ParticipantKind,
}

impl Participant {
    /// A registered-user participant.
    pub fn user(id: Uuid) -> Self {
        Self {
            id,
            kind: ParticipantKind::User,
        }
    }

    /// A guest participant.
    pub fn guest(id: Uuid) -> Self {
        Self {
            id,
            kind: ParticipantKind::Guest,
        }
    }
}
