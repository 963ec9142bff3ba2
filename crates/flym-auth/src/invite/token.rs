//! Signed invite tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flym_core::error::AppError;
use flym_core::events::InviteKind;

use crate::jwt::{JwtDecoder, JwtEncoder};

/// Claims of an invite link.
///
/// The field set is disjoint from session claims, so neither kind of token
/// deserializes as the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteClaims {
    /// User who created the invite.
    pub inviter: Uuid,
    /// Inviter display name at creation.
    pub inviter_name: String,
    /// Direct or group invite.
    pub kind: InviteKind,
    /// Existing room for group invites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
    /// Unique invite id.
    pub invite_id: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// A freshly signed invite.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvite {
    /// Compact token to embed in the invite link.
    pub token: String,
    /// When the link stops working.
    pub expires_at: DateTime<Utc>,
    /// Direct or group invite.
    pub kind: InviteKind,
}

/// Signs and validates invite tokens with the session signing key.
#[derive(Debug, Clone)]
pub struct InviteCodec {
    encoder: JwtEncoder,
    decoder: JwtDecoder,
    ttl: Duration,
}

impl InviteCodec {
    /// Create a codec issuing invites valid for `ttl`.
    pub fn new(encoder: JwtEncoder, decoder: JwtDecoder, ttl: Duration) -> Self {
        Self {
            encoder,
            decoder,
            ttl,
        }
    }

    /// Sign an invite from `inviter`.
    pub fn issue(
        &self,
        inviter: Uuid,
        inviter_name: &str,
        kind: InviteKind,
        chat_id: Option<Uuid>,
    ) -> Result<IssuedInvite, AppError> {
        if kind == InviteKind::Group && chat_id.is_none() {
            return Err(AppError::validation("A group invite needs a chat id"));
        }
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = InviteClaims {
            inviter,
            inviter_name: inviter_name.to_string(),
            kind,
            chat_id: if kind == InviteKind::Group { chat_id } else { None },
            invite_id: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(IssuedInvite {
            token: self.encoder.sign(&claims)?,
            expires_at,
            kind,
        })
    }

    /// Check signature and expiry of an invite token.
    pub fn validate(&self, token: &str) -> Result<InviteClaims, AppError> {
        let claims: InviteClaims = self.decoder.verify_as(token)?;
        if claims.kind == InviteKind::Group && claims.chat_id.is_none() {
            return Err(AppError::authentication("Malformed group invite"));
        }
        Ok(claims)
    }
}
