//! Revocation tombstones keyed by token id.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use flym_cache::keys;
use flym_cache::provider::CacheManager;
use flym_core::result::AppResult;
use flym_core::traits::CacheProvider;

use crate::jwt::{Claims, TokenType};

const TOMBSTONE: &str = "1";

/// Records revoked token ids until the token would have expired anyway.
///
/// Lookups propagate cache errors; callers must treat an error as
/// "revoked" and reject the request.
#[derive(Debug, Clone)]
pub struct RevocationStore {
    cache: Arc<CacheManager>,
}

impl RevocationStore {
    /// Create a store over the shared cache.
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    fn key(token_type: TokenType, jti: Uuid) -> String {
        match token_type {
            TokenType::Access => keys::revoked_access(jti),
            TokenType::Refresh => keys::revoked_refresh(jti),
        }
    }

    /// Revoke `jti` for `ttl`. Idempotent; a missing id or TTL, or a zero
    /// TTL, is a no-op.
    pub async fn revoke(
        &self,
        token_type: TokenType,
        jti: Option<Uuid>,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let (Some(jti), Some(ttl)) = (jti, ttl) else {
            return Ok(());
        };
        if ttl.is_zero() {
            return Ok(());
        }
        debug!(%jti, ttl_secs = ttl.as_secs(), ?token_type, "Revoking token");
        self.cache.set(&Self::key(token_type, jti), TOMBSTONE, ttl).await
    }

    /// Revoke the token behind `claims` for its remaining lifetime. Already
    /// expired tokens are skipped.
    pub async fn revoke_claims(&self, claims: &Claims) -> AppResult<()> {
        self.revoke(claims.token_type, Some(claims.jti), claims.remaining_ttl())
            .await
    }

    /// Whether `jti` has a live tombstone.
    pub async fn is_revoked(&self, token_type: TokenType, jti: Uuid) -> AppResult<bool> {
        self.cache.exists(&Self::key(token_type, jti)).await
    }
}
