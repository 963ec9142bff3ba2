//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Scheduled maintenance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the expired-guest purge.
    #[serde(default = "default_guest_cleanup_cron")]
    pub guest_cleanup_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            guest_cleanup_cron: default_guest_cleanup_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_guest_cleanup_cron() -> String {
    "0 */30 * * * *".to_string()
}
