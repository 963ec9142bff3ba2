//! Participant check run before a socket may join a room.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use flym_core::result::AppResult;
use flym_database::ChatRepository;
use flym_entity::Identity;

/// Decides whether an identity may join a room's live channel.
///
/// Every call reads the room from the repository; membership can change
/// between connect and join, so nothing is cached.
#[derive(Debug, Clone)]
pub struct AccessGate {
    repo: Arc<dyn ChatRepository>,
    timeout: Duration,
}

impl AccessGate {
    pub fn new(repo: Arc<dyn ChatRepository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// Whether `identity` is a participant of `room_id`.
    ///
    /// A guest whose token is scoped to another room is denied without a
    /// lookup. Repository failures and timeouts are returned as errors.
    pub async fn can_join(
        &self,
        identity: &Identity,
        room_scope: Option<Uuid>,
        room_id: Uuid,
    ) -> AppResult<bool> {
        if identity.is_guest() && room_scope.is_some_and(|scope| scope != room_id) {
            debug!(subject = %identity.id, %room_id, "Guest token scoped to another room");
            return Ok(false);
        }

        let room = tokio::time::timeout(self.timeout, self.repo.find_room(room_id)).await??;
        Ok(room.is_some_and(|room| room.has_participant(identity.id)))
    }
}
