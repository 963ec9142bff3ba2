//! System events exchanged between the HTTP tier, the worker and the
//! real-time engine over the bus's system channel.

pub mod invite;
pub mod maintenance;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use invite::{InviteAccepted, InviteKind};
pub use maintenance::GuestsPurged;

/// Wrapper for all system events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The identity that caused the event (if applicable).
    pub actor_id: Option<Uuid>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all system event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum EventPayload {
    /// A guest accepted an invite link.
    InviteAccepted(InviteAccepted),
    /// The retention job removed expired guests.
    GuestsPurged(GuestsPurged),
}

impl EventPayload {
    /// Wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InviteAccepted(_) => "InviteAccepted",
            Self::GuestsPurged(_) => "GuestsPurged",
        }
    }
}

impl SystemEvent {
    /// Create a new system event stamped with the current time.
    pub fn new(actor_id: Option<Uuid>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id,
            payload,
        }
    }
}
