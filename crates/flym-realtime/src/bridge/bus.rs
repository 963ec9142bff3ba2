//! The cross-process message bus contract.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use flym_core::result::AppResult;

/// A publish/subscribe bus carrying serialized envelopes between server
/// processes.
///
/// Delivery is at-least-once to every current subscriber, FIFO per
/// channel. Subscriptions are reference counted per channel: the backend
/// only drops a channel once no local receiver is left.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug + 'static {
    /// Publish a payload on a channel.
    async fn publish(&self, channel: &str, payload: String) -> AppResult<()>;

    /// Start receiving a channel's payloads.
    async fn subscribe(&self, channel: &str) -> AppResult<BusSubscription>;

    /// Release a channel once every [`BusSubscription`] for it is dropped.
    /// A no-op while receivers remain.
    async fn unsubscribe(&self, channel: &str) -> AppResult<()>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Returns the provider name for logging.
    fn provider_name(&self) -> &'static str;
}

/// One local receiver of a bus channel.
#[derive(Debug)]
pub struct BusSubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
}

impl BusSubscription {
    pub fn new(channel: impl Into<String>, receiver: broadcast::Receiver<String>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next payload, or `None` once the channel is gone.
    ///
    /// A receiver that fell behind skips the overwritten payloads.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Bus subscriber lagged, payloads dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
