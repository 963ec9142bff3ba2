//! The client/server WebSocket protocol.

pub mod types;
pub mod validator;

pub use types::{ClientMessage, ErrorCode, ServerMessage};
