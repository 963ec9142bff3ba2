//! # flym-entity
//!
//! Domain entity models for Flym chat. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities additionally derive `sqlx::FromRow`.

pub mod conversation;
pub mod guest;
pub mod identity;
pub mod user;

pub use conversation::{Conversation, Message, Participant, ParticipantKind};
pub use guest::Guest;
pub use identity::Identity;
pub use user::{PresenceStatus, User};
