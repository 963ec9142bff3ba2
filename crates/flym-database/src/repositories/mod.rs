//! The chat persistence contract and its implementations.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use flym_core::config::DatabaseConfig;
use flym_core::error::AppError;
use flym_core::events::GuestsPurged;
use flym_core::result::AppResult;
use flym_entity::{Conversation, Guest, Identity, Message, Participant, User};

pub use memory::MemoryChatRepository;
pub use postgres::PgChatRepository;

/// Persistence operations the chat core depends on.
///
/// Every method is a single logical write or read; multi-statement writes
/// run inside one transaction.
#[async_trait]
pub trait ChatRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Load a room with its ordered participant list.
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<Conversation>>;

    /// Create a room with the given id and participants (in order).
    async fn create_room(&self, room_id: Uuid, participants: &[Participant])
    -> AppResult<Conversation>;

    /// Return the room whose participant set is exactly `participant_ids`,
    /// creating it if none exists.
    ///
    /// Each id is resolved to a user or a guest; an unknown id is
    /// `NotFound`.
    async fn get_or_create_room(&self, participant_ids: &[Uuid]) -> AppResult<Conversation>;

    /// Append a participant to a room. Adding an existing participant is a
    /// no-op.
    async fn add_participant(
        &self,
        room_id: Uuid,
        participant: Participant,
    ) -> AppResult<Conversation>;

    /// Persist a message and refresh the room's last-message cache.
    ///
    /// Fails with `NotFound` for an unknown room and `Authorization` when
    /// the sender is not a participant.
    async fn append_message(&self, room_id: Uuid, sender_id: Uuid, text: &str)
    -> AppResult<Message>;

    /// Most recent messages of a room, oldest first.
    async fn recent_messages(&self, room_id: Uuid, limit: i64) -> AppResult<Vec<Message>>;

    /// Resolve an id to a user or a live guest.
    async fn find_identity(&self, id: Uuid) -> AppResult<Option<Identity>>;

    /// Load a registered user.
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Load a registered user by email, compared case-insensitively.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Persist a new guest.
    async fn create_guest(&self, guest: &Guest) -> AppResult<Guest>;

    /// Delete guests expired at `now`, remove them from every participant
    /// list and delete rooms left without participants.
    async fn purge_expired_guests(&self, now: DateTime<Utc>) -> AppResult<GuestsPurged>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Build the repository selected by `database.provider`, running
/// migrations for PostgreSQL.
pub async fn connect_repository(config: &DatabaseConfig) -> AppResult<Arc<dyn ChatRepository>> {
    match config.provider.as_str() {
        "postgres" => {
            let pool = crate::connection::DatabasePool::connect(config).await?;
            crate::migration::run_migrations(pool.pool()).await?;
            Ok(Arc::new(PgChatRepository::new(pool.pool().clone())))
        }
        "memory" => {
            info!("Using in-memory chat repository; data is lost on restart");
            Ok(Arc::new(MemoryChatRepository::new()))
        }
        other => Err(AppError::configuration(format!(
            "Unknown database provider: '{other}'. Supported: postgres, memory"
        ))),
    }
}

/// Sorted, de-duplicated copy of `ids`.
pub(crate) fn normalize_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
