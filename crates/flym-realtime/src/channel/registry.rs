//! Room registry: which local connections sit in which room, and which
//! belong to which user.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::connection::handle::{ConnectionHandle, ConnectionId};

/// Result of moving a connection into a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room the connection was in before.
    pub previous: Option<Uuid>,
    /// `previous`, if the move left it without local members.
    pub vacated: Option<Uuid>,
}

/// Result of taking a connection out of its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Room the connection left.
    pub room: Uuid,
    /// Whether the room has no local members left.
    pub vacated: bool,
}

/// A connection removed from the registry.
#[derive(Debug)]
pub struct Removal {
    /// The removed connection.
    pub handle: Arc<ConnectionHandle>,
    /// Its room, if the removal left it without local members.
    pub vacated_room: Option<Uuid>,
}

/// Per-process index of live connections.
///
/// Maps are sharded by `DashMap`, so unrelated rooms never contend on one
/// lock. A connection is in at most one room set and exactly one user set;
/// empty sets are dropped.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Room ID → connections joined to it.
    rooms: DashMap<Uuid, HashSet<ConnectionId>>,
    /// User or guest ID → its connections, independent of rooms.
    users: DashMap<Uuid, HashSet<ConnectionId>>,
    /// Connection ID → handle.
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly authenticated connection.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        self.users
            .entry(handle.user_id())
            .or_default()
            .insert(handle.id);
        self.connections.insert(handle.id, handle);
    }

    /// Remove a connection from every index.
    pub fn unregister(&self, conn_id: ConnectionId) -> Option<Removal> {
        let (_, handle) = self.connections.remove(&conn_id)?;

        let user_id = handle.user_id();
        if let Some(mut conns) = self.users.get_mut(&user_id) {
            conns.remove(&conn_id);
        }
        self.users.remove_if(&user_id, |_, conns| conns.is_empty());

        let vacated_room = handle
            .replace_room(None)
            .filter(|room| self.remove_from_room(*room, conn_id));

        Some(Removal {
            handle,
            vacated_room,
        })
    }

    /// Move a connection into `room_id`, evicting it from its previous room.
    ///
    /// Returns `None` when the connection is not registered.
    pub fn join(&self, conn_id: ConnectionId, room_id: Uuid) -> Option<JoinOutcome> {
        let handle = self.get(conn_id)?;

        let previous = handle.replace_room(Some(room_id));
        if previous == Some(room_id) {
            return Some(JoinOutcome {
                previous,
                vacated: None,
            });
        }
        let vacated = previous.filter(|prev| self.remove_from_room(*prev, conn_id));

        self.rooms.entry(room_id).or_default().insert(conn_id);

        // lost a race with unregister
        if !self.connections.contains_key(&conn_id) {
            handle.replace_room(None);
            self.remove_from_room(room_id, conn_id);
            return None;
        }

        Some(JoinOutcome { previous, vacated })
    }

    /// Take a connection out of its room. `None` if it was not in one.
    pub fn leave(&self, conn_id: ConnectionId) -> Option<LeaveOutcome> {
        let handle = self.get(conn_id)?;
        let room = handle.replace_room(None)?;
        Some(LeaveOutcome {
            room,
            vacated: self.remove_from_room(room, conn_id),
        })
    }

    /// Returns true if the room set became empty and was dropped.
    fn remove_from_room(&self, room_id: Uuid, conn_id: ConnectionId) -> bool {
        if let Some(mut members) = self.rooms.get_mut(&room_id) {
            members.remove(&conn_id);
        }
        self.rooms
            .remove_if(&room_id, |_, members| members.is_empty())
            .is_some()
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, conn_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&conn_id).map(|entry| entry.value().clone())
    }

    /// Local connections joined to a room.
    pub fn room_members(&self, room_id: Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.lookup(self.rooms.get(&room_id).map(|m| m.value().clone()))
    }

    /// Local connections of a user or guest.
    pub fn user_connections(&self, user_id: Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.lookup(self.users.get(&user_id).map(|m| m.value().clone()))
    }

    fn lookup(&self, ids: Option<HashSet<ConnectionId>>) -> Vec<Arc<ConnectionHandle>> {
        ids.unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Whether `conn_id` is in the room's set.
    pub fn is_member(&self, room_id: Uuid, conn_id: ConnectionId) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|members| members.contains(&conn_id))
    }

    /// Number of local connections in a room.
    pub fn room_size(&self, room_id: Uuid) -> usize {
        self.rooms.get(&room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Returns all connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
