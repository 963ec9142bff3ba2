//! PostgreSQL chat repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use flym_core::error::{AppError, ErrorKind};
use flym_core::events::GuestsPurged;
use flym_core::result::AppResult;
use flym_entity::conversation::LastMessage;
use flym_entity::{Conversation, Guest, Identity, Message, Participant, ParticipantKind, User};

use super::{ChatRepository, normalize_ids};

/// A `conversations` row before participants are attached.
#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    last_message_sender: Option<Uuid>,
    last_message_text: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self, participants: Vec<Participant>) -> Conversation {
        let last_message = match (
            self.last_message_sender,
            self.last_message_text,
            self.last_message_at,
        ) {
            (Some(sender_id), Some(text), Some(timestamp)) => Some(LastMessage {
                sender_id,
                text,
                timestamp,
            }),
            _ => None,
        };
        Conversation {
            id: self.id,
            participants,
            last_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

/// Repository for rooms, messages and identities stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    /// Create a new repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_participants<'e, E>(executor: E, room_id: Uuid) -> AppResult<Vec<Participant>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Participant>(
            "SELECT participant_id, kind FROM conversation_participants \
             WHERE conversation_id = $1 ORDER BY position",
        )
        .bind(room_id)
        .fetch_all(executor)
        .await
        .map_err(db_err("Failed to load participants"))
    }

    async fn insert_room(
        tx: &mut Transaction<'_, Postgres>,
        room_id: Uuid,
        participants: &[Participant],
    ) -> AppResult<Conversation> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "INSERT INTO conversations (id) VALUES ($1) RETURNING *",
        )
        .bind(room_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::conflict(format!("Room {room_id} already exists"))
            }
            e => AppError::with_source(ErrorKind::Database, "Failed to create room", e),
        })?;

        let mut ordered: Vec<Participant> = Vec::with_capacity(participants.len());
        for p in participants {
            if ordered.iter().any(|o| o.id == p.id) {
                continue;
            }
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, participant_id, kind, position) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(room_id)
            .bind(p.id)
            .bind(p.kind)
            .bind(ordered.len() as i32)
            .execute(&mut **tx)
            .await
            .map_err(db_err("Failed to add participant"))?;
            ordered.push(*p);
        }

        Ok(row.into_conversation(ordered))
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>("SELECT * FROM conversations WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find room"))?;
        match row {
            Some(row) => {
                let participants = Self::load_participants(&self.pool, room_id).await?;
                Ok(Some(row.into_conversation(participants)))
            }
            None => Ok(None),
        }
    }

    async fn create_room(
        &self,
        room_id: Uuid,
        participants: &[Participant],
    ) -> AppResult<Conversation> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;
        let room = Self::insert_room(&mut tx, room_id, participants).await?;
        tx.commit().await.map_err(db_err("Failed to commit room"))?;
        Ok(room)
    }

    async fn get_or_create_room(&self, participant_ids: &[Uuid]) -> AppResult<Conversation> {
        let ids = normalize_ids(participant_ids);
        if ids.is_empty() {
            return Err(AppError::validation("A room needs at least one participant"));
        }

        let mut participants = Vec::with_capacity(ids.len());
        for id in participant_ids {
            if participants.iter().any(|p: &Participant| p.id == *id) {
                continue;
            }
            let identity = self
                .find_identity(*id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Unknown participant {id}")))?;
            participants.push(Participant {
                id: identity.id,
                kind: identity.kind,
            });
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT conversation_id FROM conversation_participants \
             GROUP BY conversation_id \
             HAVING COUNT(*) = $2 \
                AND COUNT(*) FILTER (WHERE participant_id = ANY($1)) = $2 \
             LIMIT 1",
        )
        .bind(&ids)
        .bind(ids.len() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to look up room by participants"))?;

        if let Some(room_id) = existing {
            if let Some(room) = self.find_room(room_id).await? {
                return Ok(room);
            }
        }

        self.create_room(Uuid::new_v4(), &participants).await
    }

    async fn add_participant(
        &self,
        room_id: Uuid,
        participant: Participant,
    ) -> AppResult<Conversation> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;

        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT * FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(room_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to lock room"))?
        .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;

        let inserted = sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, participant_id, kind, position) \
             SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0) \
             FROM conversation_participants WHERE conversation_id = $1 \
             ON CONFLICT (conversation_id, participant_id) DO NOTHING",
        )
        .bind(room_id)
        .bind(participant.id)
        .bind(participant.kind)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to add participant"))?
        .rows_affected();

        let row = if inserted > 0 {
            sqlx::query_as::<_, ConversationRow>(
                "UPDATE conversations SET updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err("Failed to touch room"))?
        } else {
            row
        };

        let participants = Self::load_participants(&mut *tx, room_id).await?;
        tx.commit().await.map_err(db_err("Failed to commit participant"))?;
        Ok(row.into_conversation(participants))
    }

    async fn append_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        text: &str,
    ) -> AppResult<Message> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;

        let kind: Option<ParticipantKind> = sqlx::query_scalar(
            "SELECT kind FROM conversation_participants \
             WHERE conversation_id = $1 AND participant_id = $2",
        )
        .bind(room_id)
        .bind(sender_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to resolve sender"))?;

        let Some(sender_kind) = kind else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM conversations WHERE id = $1)")
                    .bind(room_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err("Failed to check room"))?;
            return Err(if exists {
                AppError::authorization(format!("{sender_id} is not a participant of {room_id}"))
            } else {
                AppError::not_found(format!("Room {room_id} not found"))
            });
        };

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (id, conversation_id, sender_id, sender_kind, text) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(room_id)
        .bind(sender_id)
        .bind(sender_kind)
        .bind(text)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err("Failed to insert message"))?;

        sqlx::query(
            "UPDATE conversations \
             SET last_message_sender = $2, last_message_text = $3, last_message_at = $4, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to update last message"))?;

        tx.commit().await.map_err(db_err("Failed to commit message"))?;
        Ok(message)
    }

    async fn recent_messages(&self, room_id: Uuid, limit: i64) -> AppResult<Vec<Message>> {
        let mut messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(room_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load messages"))?;
        messages.reverse();
        Ok(messages)
    }

    async fn find_identity(&self, id: Uuid) -> AppResult<Option<Identity>> {
        let row: Option<(Uuid, String, ParticipantKind)> = sqlx::query_as(
            "SELECT id, name, 'user'::participant_kind FROM users WHERE id = $1 \
             UNION ALL \
             SELECT id, name, 'guest'::participant_kind FROM guests \
             WHERE id = $1 AND expires_at > NOW() \
             LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to resolve identity"))?;
        Ok(row.map(|(id, name, kind)| Identity::new(id, name, kind)))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user"))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user by email"))
    }

    async fn create_guest(&self, guest: &Guest) -> AppResult<Guest> {
        sqlx::query_as::<_, Guest>(
            "INSERT INTO guests (id, name, chat_id, inviter_id, avatar, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(guest.id)
        .bind(&guest.name)
        .bind(guest.chat_id)
        .bind(guest.inviter_id)
        .bind(&guest.avatar)
        .bind(guest.created_at)
        .bind(guest.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::not_found(format!("Inviter {} not found", guest.inviter_id))
            }
            e => AppError::with_source(ErrorKind::Database, "Failed to create guest", e),
        })
    }

    async fn purge_expired_guests(&self, now: DateTime<Utc>) -> AppResult<GuestsPurged> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;

        let expired: Vec<Uuid> =
            sqlx::query_scalar("DELETE FROM guests WHERE expires_at <= $1 RETURNING id")
                .bind(now)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err("Failed to delete expired guests"))?;
        if expired.is_empty() {
            tx.commit().await.map_err(db_err("Failed to commit purge"))?;
            return Ok(GuestsPurged::default());
        }

        let mut touched: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM conversation_participants \
             WHERE kind = 'guest' AND participant_id = ANY($1) \
             RETURNING conversation_id",
        )
        .bind(&expired)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to remove guest participants"))?;
        touched.sort_unstable();
        touched.dedup();

        let deleted: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM conversations c WHERE c.id = ANY($1) \
             AND NOT EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id = c.id) \
             RETURNING c.id",
        )
        .bind(&touched)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to delete empty rooms"))?;

        sqlx::query(
            "UPDATE conversations SET updated_at = $2 WHERE id = ANY($1)",
        )
        .bind(&touched)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to touch rooms"))?;

        tx.commit().await.map_err(db_err("Failed to commit purge"))?;

        Ok(GuestsPurged {
            guests_removed: expired.len() as u64,
            rooms_updated: (touched.len() - deleted.len()) as u64,
            rooms_deleted: deleted.len() as u64,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(db_err("Health check failed"))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
