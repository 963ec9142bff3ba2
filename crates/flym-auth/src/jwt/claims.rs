//! JWT claims structure used in access and refresh tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flym_entity::{Identity, ParticipantKind};

/// JWT claims payload embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user or guest ID.
    pub sub: Uuid,
    /// Display name at issuance.
    pub name: String,
    /// JWT ID, unique per issuance; the revocation key.
    pub jti: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Registered user or guest.
    pub role: ParticipantKind,
    /// Token type: "access" or "refresh".
    pub token_type: TokenType,
    /// Room a guest token is confined to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Uuid>,
    /// User whose invite admitted a guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter: Option<Uuid>,
}

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on every request and socket upgrade.
    Access,
    /// Longer-lived token exchanged for a fresh pair.
    Refresh,
}

/// Who a token is issued for, minus the per-issuance fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    /// User or guest ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Registered user or guest.
    pub role: ParticipantKind,
    /// Optional room scope.
    pub room: Option<Uuid>,
    /// Optional inviter (guests only).
    pub inviter: Option<Uuid>,
}

impl TokenSubject {
    /// Subject for a registered user with no room scope.
    pub fn user(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: ParticipantKind::User,
            room: None,
            inviter: None,
        }
    }

    /// Subject for a guest confined to `room`.
    pub fn guest(id: Uuid, name: impl Into<String>, room: Uuid, inviter: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            role: ParticipantKind::Guest,
            room: Some(room),
            inviter: Some(inviter),
        }
    }
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name.clone(),
            role: claims.role,
            room: claims.room,
            inviter: claims.inviter,
        }
    }
}

impl Claims {
    /// Build claims for `subject` with a fresh token id, valid for `ttl`
    /// from now.
    pub fn new(subject: &TokenSubject, token_type: TokenType, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.id,
            name: subject.name.clone(),
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            role: subject.role,
            token_type,
            room: subject.room,
            inviter: subject.inviter,
        }
    }

    /// The identity this token speaks for.
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub, self.name.clone(), self.role)
    }

    /// Whether the bearer is a guest.
    pub fn is_guest(&self) -> bool {
        self.role == ParticipantKind::Guest
    }

    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// Checks whether this token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Remaining lifetime, `None` once expired.
    pub fn remaining_ttl(&self) -> Option<std::time::Duration> {
        let remaining = self.exp - Utc::now().timestamp();
        (remaining > 0).then(|| std::time::Duration::from_secs(remaining as u64))
    }
}
