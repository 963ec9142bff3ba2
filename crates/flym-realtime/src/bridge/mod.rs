//! Cross-process fan-out: the bus contract, its backends, and the bridge
//! between the bus and local connections.

pub mod bus;
pub mod envelope;
pub mod memory_bus;
pub mod publisher;
pub mod pubsub;
#[cfg(feature = "redis-pubsub")]
pub mod redis_bus;

use std::sync::Arc;

use tracing::info;

use flym_core::config::BusConfig;
use flym_core::error::AppError;
use flym_core::result::AppResult;

pub use bus::{BusSubscription, MessageBus};
pub use envelope::{BusEnvelope, ChannelNames};
pub use memory_bus::MemoryBus;
pub use publisher::BusEventPublisher;
pub use pubsub::PubSubBridge;

/// Build the bus selected by `bus.provider`.
pub async fn connect_bus(config: &BusConfig) -> AppResult<Arc<dyn MessageBus>> {
    match config.provider.as_str() {
        "memory" => {
            info!("Using in-memory bus; fan-out is limited to this process");
            Ok(Arc::new(MemoryBus::new(config.buffer_size)))
        }
        #[cfg(feature = "redis-pubsub")]
        "redis" => Ok(Arc::new(
            redis_bus::RedisBus::connect(&config.redis_url, config.buffer_size).await?,
        )),
        other => Err(AppError::configuration(format!(
            "Unknown bus provider: '{other}'. Supported: memory, redis"
        ))),
    }
}
