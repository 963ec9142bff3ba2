//! Cache key builders for every Flym cache entry.
//!
//! Provider-level prefixes (`cache.redis.key_prefix`) are applied on top of
//! these keys by the Redis provider.

use uuid::Uuid;

/// Tombstone for a revoked access token id.
pub fn revoked_access(jti: Uuid) -> String {
    format!("at:revoked:{jti}")
}

/// Tombstone for a revoked refresh token id.
pub fn revoked_refresh(jti: Uuid) -> String {
    format!("rt:revoked:{jti}")
}
