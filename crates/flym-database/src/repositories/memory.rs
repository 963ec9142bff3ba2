//! In-memory chat repository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use flym_core::error::AppError;
use flym_core::events::GuestsPurged;
use flym_core::result::AppResult;
use flym_entity::conversation::LastMessage;
use flym_entity::{
    Conversation, Guest, Identity, Message, Participant, ParticipantKind, PresenceStatus, User,
};

use super::{ChatRepository, normalize_ids};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    guests: HashMap<Uuid, Guest>,
    rooms: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<Message>>,
}

impl State {
    fn identity(&self, id: Uuid, now: DateTime<Utc>) -> Option<Identity> {
        if let Some(user) = self.users.get(&id) {
            return Some(Identity::from(user));
        }
        self.guests
            .get(&id)
            .filter(|g| !g.is_expired_at(now))
            .map(Identity::from)
    }
}

/// Process-local repository backed by hash maps behind one async lock.
#[derive(Debug, Default)]
pub struct MemoryChatRepository {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryChatRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user account. Accounts are managed elsewhere, so this is
    /// how dev runs and tests seed them.
    pub async fn create_user(&self, name: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: None,
            friend_id: None,
            avatar: None,
            status: PresenceStatus::Offline,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.users.insert(user.id, user.clone());
        user
    }

    /// Store a password hash for an existing user.
    pub async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;
        user.password_hash = Some(hash.to_string());
        Ok(())
    }

    /// Make every subsequent call fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored rooms.
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("in-memory repository marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for MemoryChatRepository {
    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<Conversation>> {
        self.ensure_available()?;
        Ok(self.state.read().await.rooms.get(&room_id).cloned())
    }

    async fn create_room(
        &self,
        room_id: Uuid,
        participants: &[Participant],
    ) -> AppResult<Conversation> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if state.rooms.contains_key(&room_id) {
            return Err(AppError::conflict(format!("Room {room_id} already exists")));
        }
        let mut ordered: Vec<Participant> = Vec::with_capacity(participants.len());
        for p in participants {
            if !ordered.iter().any(|o| o.id == p.id) {
                ordered.push(*p);
            }
        }
        let now = Utc::now();
        let room = Conversation {
            id: room_id,
            participants: ordered,
            last_message: None,
            created_at: now,
            updated_at: now,
        };
        state.rooms.insert(room_id, room.clone());
        Ok(room)
    }

    async fn get_or_create_room(&self, participant_ids: &[Uuid]) -> AppResult<Conversation> {
        self.ensure_available()?;
        let ids = normalize_ids(participant_ids);
        if ids.is_empty() {
            return Err(AppError::validation("A room needs at least one participant"));
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut participants = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            if participants.iter().any(|p: &Participant| p.id == *id) {
                continue;
            }
            let identity = state
                .identity(*id, now)
                .ok_or_else(|| AppError::not_found(format!("Unknown participant {id}")))?;
            participants.push(Participant {
                id: identity.id,
                kind: identity.kind,
            });
        }

        if let Some(existing) = state.rooms.values().find(|r| r.has_exact_participants(&ids)) {
            return Ok(existing.clone());
        }

        let room = Conversation {
            id: Uuid::new_v4(),
            participants,
            last_message: None,
            created_at: now,
            updated_at: now,
        };
        state.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn add_participant(
        &self,
        room_id: Uuid,
        participant: Participant,
    ) -> AppResult<Conversation> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;
        if !room.has_participant(participant.id) {
            room.participants.push(participant);
            room.updated_at = Utc::now();
        }
        Ok(room.clone())
    }

    async fn append_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        text: &str,
    ) -> AppResult<Message> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;
        let sender = room
            .participants
            .iter()
            .find(|p| p.id == sender_id)
            .copied()
            .ok_or_else(|| {
                AppError::authorization(format!("{sender_id} is not a participant of {room_id}"))
            })?;

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: room_id,
            sender_id,
            sender_kind: sender.kind,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        room.last_message = Some(LastMessage::from(&message));
        room.updated_at = message.created_at;
        state
            .messages
            .entry(room_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn recent_messages(&self, room_id: Uuid, limit: i64) -> AppResult<Vec<Message>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let all = state.messages.get(&room_id).map(Vec::as_slice).unwrap_or(&[]);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX).min(all.len());
        Ok(all[all.len() - take..].to_vec())
    }

    async fn find_identity(&self, id: Uuid) -> AppResult<Option<Identity>> {
        self.ensure_available()?;
        Ok(self.state.read().await.identity(id, Utc::now()))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.ensure_available()?;
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn create_guest(&self, guest: &Guest) -> AppResult<Guest> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if !state.users.contains_key(&guest.inviter_id) {
            return Err(AppError::not_found(format!(
                "Inviter {} not found",
                guest.inviter_id
            )));
        }
        state.guests.insert(guest.id, guest.clone());
        Ok(guest.clone())
    }

    async fn purge_expired_guests(&self, now: DateTime<Utc>) -> AppResult<GuestsPurged> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let expired: Vec<Uuid> = state
            .guests
            .values()
            .filter(|g| g.is_expired_at(now))
            .map(|g| g.id)
            .collect();
        if expired.is_empty() {
            return Ok(GuestsPurged::default());
        }
        for id in &expired {
            state.guests.remove(id);
        }

        let mut report = GuestsPurged {
            guests_removed: expired.len() as u64,
            ..GuestsPurged::default()
        };
        let mut emptied = Vec::new();
        for room in state.rooms.values_mut() {
            let before = room.participants.len();
            room.participants
                .retain(|p| !(p.kind == ParticipantKind::Guest && expired.contains(&p.id)));
            if room.participants.len() == before {
                continue;
            }
            if room.participants.is_empty() {
                emptied.push(room.id);
            } else {
                room.updated_at = now;
                report.rooms_updated += 1;
            }
        }
        for id in emptied {
            state.rooms.remove(&id);
            state.messages.remove(&id);
            report.rooms_deleted += 1;
        }
        Ok(report)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
