//! Guest entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A short-lived identity bound to one inviting user and one room.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guest {
    /// Unique guest identifier.
    pub id: Uuid,
    /// Display name chosen at invite acceptance.
    pub name: String,
    /// The room this guest was admitted to.
    pub chat_id: Uuid,
    /// The user whose invite was accepted.
    pub inviter_id: Uuid,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// When the guest was created.
    pub created_at: DateTime<Utc>,
    /// After this instant the guest is purged.
    pub expires_at: DateTime<Utc>,
}

impl Guest {
    /// Whether the guest has outlived its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
