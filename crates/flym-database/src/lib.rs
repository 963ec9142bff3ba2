//! # flym-database
//!
//! Chat persistence. The [`ChatRepository`] trait is the collaborator the
//! realtime tier, the HTTP tier and the worker talk to; it has a PostgreSQL
//! implementation and an in-memory one used by tests and single-node dev
//! runs.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{ChatRepository, MemoryChatRepository, PgChatRepository};
