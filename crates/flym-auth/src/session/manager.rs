//! Session lifecycle manager: token pairs, authentication, refresh, logout.

use std::sync::Arc;

use tracing::{debug, info, warn};

use flym_core::config::AuthConfig;
use flym_core::error::AppError;
use flym_core::result::AppResult;

use crate::jwt::{Claims, IssuedToken, JwtDecoder, JwtEncoder, TokenSubject, TokenType};
use crate::revocation::RevocationStore;

use super::client::{ClientType, TokenPair};

/// Issues and checks session tokens.
///
/// This is the single entry point protected routes and socket upgrades use
/// to turn a presented token into trusted claims.
#[derive(Clone)]
pub struct SessionManager {
    encoder: Arc<JwtEncoder>,
    decoder: Arc<JwtDecoder>,
    revocation: Arc<RevocationStore>,
    config: AuthConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("access_ttl_minutes", &self.config.access_ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a new session manager.
    pub fn new(
        encoder: Arc<JwtEncoder>,
        decoder: Arc<JwtDecoder>,
        revocation: Arc<RevocationStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            encoder,
            decoder,
            revocation,
            config,
        }
    }

    /// The token encoder.
    pub fn encoder(&self) -> &JwtEncoder {
        &self.encoder
    }

    /// The token decoder.
    pub fn decoder(&self) -> &JwtDecoder {
        &self.decoder
    }

    /// The revocation store.
    pub fn revocation(&self) -> &RevocationStore {
        &self.revocation
    }

    /// Issues an access token plus a refresh token whose lifetime depends on
    /// the client type.
    pub fn issue_pair(&self, subject: &TokenSubject, client: ClientType) -> AppResult<TokenPair> {
        let refresh_ttl = match client {
            ClientType::Web => self.config.refresh_ttl_web(),
            ClientType::Pwa => self.config.refresh_ttl_pwa(),
        };
        let access = self
            .encoder
            .issue(subject, TokenType::Access, self.config.access_ttl())?;
        let refresh = self.encoder.issue(subject, TokenType::Refresh, refresh_ttl)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.claims.expires_at(),
            refresh_expires_at: refresh.claims.expires_at(),
            client_type: client,
        })
    }

    /// Issues the single access token a guest carries for its whole
    /// lifetime.
    pub fn issue_guest_token(&self, subject: &TokenSubject) -> AppResult<IssuedToken> {
        self.encoder
            .issue(subject, TokenType::Access, self.config.guest_ttl())
    }

    /// Verifies an access token and checks it against the revocation store.
    ///
    /// A revocation store failure is returned as-is (a cache error), so the
    /// caller rejects the request rather than trusting an unchecked token.
    pub async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        self.verify_live(token, TokenType::Access).await
    }

    /// Exchanges a refresh token for a new pair and revokes the old refresh
    /// token.
    pub async fn refresh(&self, refresh_token: &str, client: ClientType) -> AppResult<TokenPair> {
        let claims = self.verify_live(refresh_token, TokenType::Refresh).await?;
        let pair = self.issue_pair(&TokenSubject::from(&claims), client)?;
        self.revocation.revoke_claims(&claims).await?;
        info!(subject = %claims.sub, "Session refreshed");
        Ok(pair)
    }

    /// Revokes whatever access and refresh tokens were presented.
    ///
    /// Tokens are decoded, not verified, so expired or garbled input is
    /// skipped instead of failing the logout.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> AppResult<()> {
        for (token, expected) in [
            (access_token, TokenType::Access),
            (refresh_token, TokenType::Refresh),
        ] {
            let Some(claims) = token.and_then(|t| self.decoder.decode(t)) else {
                continue;
            };
            if claims.token_type != expected {
                warn!(jti = %claims.jti, "Token presented in the wrong slot at logout");
            }
            self.revocation.revoke_claims(&claims).await?;
            debug!(jti = %claims.jti, "Token revoked at logout");
        }
        Ok(())
    }

    async fn verify_live(&self, token: &str, expected: TokenType) -> AppResult<Claims> {
        let claims = self.decoder.verify(token)?;
        if claims.token_type != expected {
            return Err(AppError::authentication(match expected {
                TokenType::Access => "Invalid token type: expected access token",
                TokenType::Refresh => "Invalid token type: expected refresh token",
            }));
        }
        if self.revocation.is_revoked(expected, claims.jti).await? {
            return Err(AppError::authentication("Token has been revoked"));
        }
        Ok(claims)
    }
}
