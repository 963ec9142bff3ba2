//! Scheduled maintenance for Flym chat.
//!
//! This crate provides:
//! - A cron scheduler for periodic maintenance tasks
//! - The expired-guest purge job

pub mod jobs;
pub mod scheduler;

pub use jobs::GuestCleanupJob;
pub use scheduler::CronScheduler;
