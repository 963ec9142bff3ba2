//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flym_auth::{ClientType, TokenPair};
use flym_core::events::InviteKind;
use flym_entity::{Conversation, Participant, ParticipantKind, User};
use flym_realtime::metrics::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Issued session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub client_type: ClientType,
}

impl From<TokenPair> for SessionResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
            client_type: pair.client_type,
        }
    }
}

/// A registered user as returned at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
        }
    }
}

/// Successful password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub session: SessionResponse,
}

/// A chat room and its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: Uuid,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ChatResponse {
    fn from(room: Conversation) -> Self {
        Self {
            id: room.id,
            participants: room.participants,
            created_at: room.created_at,
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: ParticipantKind,
    /// Room a guest session is scoped to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued invite link token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub token: String,
    pub kind: InviteKind,
    pub expires_at: DateTime<Utc>,
}

/// Session of a guest admitted through an invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestSessionResponse {
    pub guest_id: Uuid,
    pub name: String,
    pub chat_id: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// Liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness with dependency checks and engine counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
    pub bus: ComponentHealth,
    pub ws_connections: usize,
    pub online_users: usize,
    pub active_rooms: usize,
    pub metrics: MetricsSnapshot,
}

/// One dependency's check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub provider: String,
    pub healthy: bool,
}
