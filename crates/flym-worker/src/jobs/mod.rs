//! Maintenance job implementations.

pub mod guest_cleanup;

pub use guest_cleanup::GuestCleanupJob;
