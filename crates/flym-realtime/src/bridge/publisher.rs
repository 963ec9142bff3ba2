//! System events onto the bus.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use flym_core::events::SystemEvent;
use flym_core::result::AppResult;
use flym_core::traits::EventPublisher;

use super::bus::MessageBus;

/// [`EventPublisher`] writing to the bus's system channel.
#[derive(Debug, Clone)]
pub struct BusEventPublisher {
    bus: Arc<dyn MessageBus>,
    channel: String,
}

impl BusEventPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, channel: impl Into<String>) -> Self {
        Self {
            bus,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for BusEventPublisher {
    async fn publish(&self, event: SystemEvent) -> AppResult<()> {
        let json = serde_json::to_string(&event)?;
        self.bus.publish(&self.channel, json).await?;
        debug!(event_type = event.payload.event_type(), event_id = %event.id, "System event published");
        Ok(())
    }
}
