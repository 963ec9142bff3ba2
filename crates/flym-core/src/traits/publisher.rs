//! System event publishing.

use async_trait::async_trait;

use crate::events::SystemEvent;
use crate::result::AppResult;

/// Publishes [`SystemEvent`]s onto the cross-process system channel.
///
/// Callers treat publishing as fire-and-forget: a failure is logged by the
/// caller and never turned into a failed request.
#[async_trait]
pub trait EventPublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Publish one event.
    async fn publish(&self, event: SystemEvent) -> AppResult<()>;
}
