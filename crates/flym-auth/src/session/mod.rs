//! Session token pairs, password login, refresh rotation, and logout.

pub mod client;
pub mod login;
pub mod manager;

pub use client::{ClientType, TokenPair};
pub use login::LoginService;
pub use manager::SessionManager;
