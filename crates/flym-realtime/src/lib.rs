//! # flym-realtime
//!
//! WebSocket chat engine for Flym.
//!
//! ## Modules
//!
//! - `connection`: per-socket handles, upgrade authentication, lifecycle and heartbeat
//! - `channel`: the per-process room and user registry
//! - `access`: participant check run on every join
//! - `bridge`: the cross-process bus and room/user fan-out
//! - `notification`: direct notifications and system event delivery
//! - `message`: the client/server wire protocol
//! - `metrics`: engine counters

pub mod access;
pub mod bridge;
pub mod channel;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod server;

pub use bridge::{MemoryBus, MessageBus, PubSubBridge};
pub use channel::RoomRegistry;
pub use connection::{ConnectionHandle, ConnectionManager, OutboundFrame};
pub use notification::NotificationDispatcher;
pub use server::RealtimeEngine;
