//! Maintenance events.

use serde::{Deserialize, Serialize};

/// Outcome of one expired-guest purge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestsPurged {
    /// Guests deleted.
    pub guests_removed: u64,
    /// Rooms that lost at least one participant but kept others.
    pub rooms_updated: u64,
    /// Rooms deleted because no participant remained.
    pub rooms_deleted: u64,
}
