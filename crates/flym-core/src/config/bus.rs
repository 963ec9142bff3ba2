//! Pub/sub bus configuration.

use serde::{Deserialize, Serialize};

/// Cross-process message bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus provider: `"memory"` (single process) or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis URL used when `provider = "redis"`.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prefix applied to every bus channel name.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    /// Per-channel buffer of the in-process fan-out.
    #[serde(default = "default_buffer")]
    pub buffer_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            channel_prefix: default_channel_prefix(),
            buffer_size: default_buffer(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_channel_prefix() -> String {
    "flym:".to_string()
}

fn default_buffer() -> usize {
    1024
}
