//! Collaborator traits shared across crates.

pub mod cache;
pub mod publisher;

pub use cache::CacheProvider;
pub use publisher::EventPublisher;
