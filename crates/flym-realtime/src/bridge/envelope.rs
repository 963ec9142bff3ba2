//! What travels on the bus, and under which channel names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::types::ServerMessage;

/// A server message plus its delivery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BusEnvelope {
    /// A chat message for every local member of a room.
    ChatMessage {
        room_id: Uuid,
        payload: ServerMessage,
    },
    /// A room-scoped system event.
    System {
        room_id: Uuid,
        payload: ServerMessage,
    },
    /// An event for every connection of one user, whatever room it is in.
    DirectNotification {
        user_id: Uuid,
        payload: ServerMessage,
    },
}

/// Bus channel names under a shared prefix.
///
/// Each room has its own channel so a process only receives traffic for
/// rooms it has local members in.
#[derive(Debug, Clone)]
pub struct ChannelNames {
    prefix: String,
}

impl ChannelNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Chat and room system events of one room.
    pub fn room(&self, room_id: Uuid) -> String {
        format!("{}room:{room_id}", self.prefix)
    }

    /// Direct notifications to users.
    pub fn notify(&self) -> String {
        format!("{}notify", self.prefix)
    }

    /// System events from the HTTP tier and the worker.
    pub fn system(&self) -> String {
        format!("{}system", self.prefix)
    }
}
