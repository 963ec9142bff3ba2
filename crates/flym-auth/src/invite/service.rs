//! Invite creation, preview, and acceptance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use flym_core::error::{AppError, ErrorKind};
use flym_core::events::{EventPayload, InviteAccepted, InviteKind, SystemEvent};
use flym_core::result::AppResult;
use flym_core::traits::EventPublisher;
use flym_database::ChatRepository;
use flym_entity::{Conversation, Guest, Participant};

use crate::jwt::{Claims, IssuedToken, TokenSubject};
use crate::session::SessionManager;

use super::token::{InviteCodec, IssuedInvite};

/// First message a guest posts in a direct room.
pub const DIRECT_INVITE_GREETING: &str = "👋 Hi, I accepted your invite.";

/// Longest accepted guest display name, in characters.
pub const MAX_GUEST_NAME_CHARS: usize = 50;

/// What an invite link shows before acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct InvitePreview {
    /// Whether the link can still be accepted.
    pub valid: bool,
    /// Inviter display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    /// Direct or group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<InviteKind>,
}

/// Result of a successful acceptance.
#[derive(Debug, Clone)]
pub struct AcceptedInvite {
    /// The new guest.
    pub guest: Guest,
    /// The room the guest now belongs to.
    pub room: Conversation,
    /// Session token for the guest, scoped to `room`.
    pub token: IssuedToken,
}

/// Orchestrates invites across the token codec, persistence, sessions and
/// the system event channel.
#[derive(Debug, Clone)]
pub struct InviteService {
    codec: InviteCodec,
    repo: Arc<dyn ChatRepository>,
    sessions: Arc<SessionManager>,
    publisher: Arc<dyn EventPublisher>,
    guest_ttl: Duration,
}

impl InviteService {
    /// Create the service.
    pub fn new(
        codec: InviteCodec,
        repo: Arc<dyn ChatRepository>,
        sessions: Arc<SessionManager>,
        publisher: Arc<dyn EventPublisher>,
        guest_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            repo,
            sessions,
            publisher,
            guest_ttl,
        }
    }

    /// Create an invite on behalf of an authenticated registered user.
    ///
    /// Group invites require the inviter to be a participant of the room.
    pub async fn create(
        &self,
        inviter: &Claims,
        kind: InviteKind,
        chat_id: Option<Uuid>,
    ) -> AppResult<IssuedInvite> {
        if inviter.is_guest() {
            return Err(AppError::authorization("Guests cannot create invites"));
        }
        if kind == InviteKind::Group {
            let room_id = chat_id.ok_or_else(|| AppError::validation("chat_id is required"))?;
            let room = self
                .repo
                .find_room(room_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Room {room_id} not found")))?;
            if !room.has_participant(inviter.sub) {
                return Err(AppError::authorization("Not a participant of this room"));
            }
        }
        let invite = self.codec.issue(inviter.sub, &inviter.name, kind, chat_id)?;
        info!(inviter = %inviter.sub, ?kind, "Invite created");
        Ok(invite)
    }

    /// Describe an invite without accepting it. Invalid or expired links
    /// yield `valid: false` rather than an error.
    pub fn preview(&self, token: &str) -> InvitePreview {
        match self.codec.validate(token) {
            Ok(claims) => InvitePreview {
                valid: true,
                inviter_name: Some(claims.inviter_name),
                kind: Some(claims.kind),
            },
            Err(_) => InvitePreview {
                valid: false,
                inviter_name: None,
                kind: None,
            },
        }
    }

    /// Accept an invite: create the guest, place it in a room, issue its
    /// session token and announce the acceptance.
    pub async fn accept(&self, token: &str, guest_name: &str) -> AppResult<AcceptedInvite> {
        let invite = self.codec.validate(token)?;
        let guest_name = normalize_guest_name(guest_name)?;

        let inviter = self
            .repo
            .find_user(invite.inviter)
            .await?
            .ok_or_else(|| AppError::not_found("The inviting user no longer exists"))?;

        let chat_id = match invite.kind {
            InviteKind::Group => invite
                .chat_id
                .ok_or_else(|| AppError::validation("Group invite without chat id"))?,
            InviteKind::Direct => Uuid::new_v4(),
        };

        let now = Utc::now();
        let guest = self
            .repo
            .create_guest(&Guest {
                id: Uuid::new_v4(),
                name: guest_name,
                chat_id,
                inviter_id: inviter.id,
                avatar: None,
                created_at: now,
                expires_at: now + self.guest_ttl,
            })
            .await?;

        let room = match invite.kind {
            InviteKind::Group => {
                self.repo
                    .add_participant(chat_id, Participant::guest(guest.id))
                    .await?
            }
            InviteKind::Direct => {
                let room = self
                    .repo
                    .create_room(
                        chat_id,
                        &[Participant::user(inviter.id), Participant::guest(guest.id)],
                    )
                    .await?;
                self.repo
                    .append_message(chat_id, guest.id, DIRECT_INVITE_GREETING)
                    .await?;
                self.repo.find_room(chat_id).await?.unwrap_or(room)
            }
        };

        let token = self.sessions.issue_guest_token(&TokenSubject::guest(
            guest.id,
            guest.name.clone(),
            room.id,
            inviter.id,
        ))?;

        let event = SystemEvent::new(
            Some(guest.id),
            EventPayload::InviteAccepted(InviteAccepted {
                chat_id: room.id,
                inviter_id: inviter.id,
                guest_id: guest.id,
                guest_name: guest.name.clone(),
                kind: invite.kind,
                participants: room.participant_ids(),
            }),
        );
        if let Err(e) = self.publisher.publish(event).await {
            warn!(error = %e, guest_id = %guest.id, "Failed to publish InviteAccepted");
        }

        info!(
            guest_id = %guest.id,
            inviter_id = %inviter.id,
            room_id = %room.id,
            kind = ?invite.kind,
            "Invite accepted"
        );
        Ok(AcceptedInvite { guest, room, token })
    }
}

fn normalize_guest_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::new(ErrorKind::Validation, "Guest name is required"));
    }
    if name.chars().count() > MAX_GUEST_NAME_CHARS {
        return Err(AppError::validation(format!(
            "Guest name must be at most {MAX_GUEST_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}
