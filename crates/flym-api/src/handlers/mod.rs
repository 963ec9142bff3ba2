//! Route handlers organized by domain.

pub mod auth;
pub mod chats;
pub mod health;
pub mod invite;
pub mod ws;
