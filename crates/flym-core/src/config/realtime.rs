//! Real-time WebSocket engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Interval between heartbeat sweeps in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Per-connection outbound queue length.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Maximum chat message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Maximum raw inbound frame size in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Deadline for persistence, bus and revocation calls in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

impl RealtimeConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds.max(1))
    }

    /// Collaborator call deadline as a [`Duration`].
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms.max(1))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            channel_buffer_size: default_channel_buffer(),
            max_message_length: default_max_message_length(),
            max_frame_bytes: default_max_frame_bytes(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_channel_buffer() -> usize {
    256
}

fn default_max_message_length() -> usize {
    2000
}

fn default_max_frame_bytes() -> usize {
    16 * 1024
}

fn default_operation_timeout() -> u64 {
    5000
}
