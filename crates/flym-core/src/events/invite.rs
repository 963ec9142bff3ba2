//! Invite lifecycle events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an accepted invite places the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteKind {
    /// A new two-party room between inviter and guest.
    Direct,
    /// The guest joins an existing room of the inviter.
    Group,
}

/// Emitted after a guest accepted an invite and the room is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteAccepted {
    /// Room the guest was placed in.
    pub chat_id: Uuid,
    /// User who issued the invite.
    pub inviter_id: Uuid,
    /// Newly created guest identity.
    pub guest_id: Uuid,
    /// Guest display name.
    pub guest_name: String,
    /// Direct or group invite.
    pub kind: InviteKind,
    /// Participant ids of the room after acceptance.
    pub participants: Vec<Uuid>,
}
