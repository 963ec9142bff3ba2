//! JWT token creation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use flym_core::config::AuthConfig;
use flym_core::error::AppError;

use super::claims::{Claims, TokenSubject, TokenType};

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS string.
    pub token: String,
    /// Claims embedded in `token`.
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiry of the token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

/// Creates signed HS256 tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").finish_non_exhaustive()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    ///
    /// An empty secret is a configuration error, reported once at startup.
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        })
    }

    /// Signs arbitrary claims.
    pub fn sign<T: serde::Serialize>(&self, claims: &T) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Issues a token for `subject` valid for `ttl`, with a fresh token id.
    pub fn issue(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken, AppError> {
        let claims = Claims::new(subject, token_type, ttl);
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }
}
