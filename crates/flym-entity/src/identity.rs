//! The resolved subject behind a token or a participant id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ParticipantKind;
use crate::guest::Guest;
use crate::user::User;

/// Subject id, display name and kind of a user or guest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// User or guest id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Registered user or guest.
    pub kind: ParticipantKind,
}

impl Identity {
    /// Builds an identity from its parts.
    pub fn new(id: Uuid, name: impl Into<String>, kind: ParticipantKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    /// Whether this identity is an ephemeral guest.
    pub fn is_guest(&self) -> bool {
        self.kind == ParticipantKind::Guest
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.name.clone(), ParticipantKind::User)
    }
}

impl From<&Guest> for Identity {
    fn from(guest: &Guest) -> Self {
        Self::new(guest.id, guest.name.clone(), ParticipantKind::Guest)
    }
}
