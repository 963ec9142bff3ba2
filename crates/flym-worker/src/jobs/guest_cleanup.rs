//! Expired guest purge.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use flym_core::events::{EventPayload, GuestsPurged, SystemEvent};
use flym_core::result::AppResult;
use flym_core::traits::EventPublisher;
use flym_database::ChatRepository;

/// Deletes expired guests, strips them from every room and deletes rooms
/// left without participants.
#[derive(Debug)]
pub struct GuestCleanupJob {
    /// Chat repository
    repo: Arc<dyn ChatRepository>,
    /// System event publisher
    publisher: Arc<dyn EventPublisher>,
}

impl GuestCleanupJob {
    /// Create a new guest cleanup job
    pub fn new(repo: Arc<dyn ChatRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { repo, publisher }
    }

    /// Purge guests expired as of now.
    pub async fn run(&self) -> AppResult<GuestsPurged> {
        self.run_at(Utc::now()).await
    }

    /// Purge guests expired at `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<GuestsPurged> {
        tracing::debug!("Running guest cleanup");
        let report = self.repo.purge_expired_guests(now).await?;

        if report.guests_removed == 0 {
            tracing::debug!("No expired guests");
            return Ok(report);
        }

        tracing::info!(
            guests_removed = report.guests_removed,
            rooms_updated = report.rooms_updated,
            rooms_deleted = report.rooms_deleted,
            "Expired guests purged"
        );

        let event = SystemEvent::new(None, EventPayload::GuestsPurged(report.clone()));
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(error = %e, "Failed to publish guest purge event");
        }
        Ok(report)
    }
}
