//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::PresenceStatus;

/// A registered account. Account management lives outside this service;
/// the realtime tier only reads users to resolve identities.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Argon2id hash of the password; `None` for accounts that cannot log
    /// in with a password.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    /// Short shareable code other users add as a friend.
    pub friend_id: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Presence flag.
    pub status: PresenceStatus,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
