//! Ephemeral guest identities created by invite acceptance.

pub mod model;

pub use model::Guest;
