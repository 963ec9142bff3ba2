//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use flym_core::config::WorkerConfig;
use flym_core::error::AppError;

use crate::jobs::GuestCleanupJob;

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Schedules
    config: WorkerConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("guest_cleanup_cron", &self.config.guest_cleanup_cron)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(config: WorkerConfig) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler, config })
    }

    /// Expired guest purge, on `worker.guest_cleanup_cron`
    pub async fn register_guest_cleanup(&self, job: Arc<GuestCleanupJob>) -> Result<(), AppError> {
        let cron = self.config.guest_cleanup_cron.clone();
        let schedule = CronJob::new_async(cron.as_str(), move |_uuid, _lock| {
            let job = Arc::clone(&job);
            Box::pin(async move {
                if let Err(e) = job.run().await {
                    tracing::error!(error = %e, "Guest cleanup failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid guest cleanup schedule '{cron}': {e}"))
        })?;

        self.scheduler.add(schedule).await.map_err(|e| {
            AppError::internal(format!("Failed to add guest_cleanup schedule: {e}"))
        })?;

        tracing::info!(cron = %cron, "Registered: guest_cleanup");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
