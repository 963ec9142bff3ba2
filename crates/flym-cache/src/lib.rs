//! # flym-cache
//!
//! Cache provider implementations for Flym. Supports two modes:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//!   with a per-entry expiry policy
//! - **redis**: Redis-backed cache shared by every server process
//!
//! The provider is selected at runtime based on configuration. The cache
//! holds revocation tombstones, so each entry must expire at exactly its
//! own TTL.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
