//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use flym_core::error::AppError;
use flym_core::events::InviteKind;

/// Password login request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token refresh request body. The `rt` cookie takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: Option<String>,
}

/// Create invite request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_invite_target"))]
pub struct CreateInviteRequest {
    /// Direct or group.
    pub kind: InviteKind,
    /// Room a group invite admits to.
    #[serde(default, alias = "chatId")]
    pub chat_id: Option<Uuid>,
}

fn validate_invite_target(req: &CreateInviteRequest) -> Result<(), ValidationError> {
    if req.kind == InviteKind::Group && req.chat_id.is_none() {
        return Err(ValidationError::new("chat_id_required")
            .with_message("chat_id is required for a group invite".into()));
    }
    Ok(())
}

/// Accept invite request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    /// Display name for the new guest.
    #[serde(alias = "guestName")]
    #[validate(length(min = 1, max = 50, message = "Guest name must be 1-50 characters"))]
    pub guest_name: String,
}

/// Open (or find) the room for an exact participant set.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateChatRequest {
    /// Every member of the room, the caller included.
    #[validate(length(min = 2, max = 50, message = "A chat needs 2-50 participants"))]
    pub participants: Vec<Uuid>,
}

/// Run `validator` checks, mapping failures to a validation error.
pub fn validated<T: Validate>(req: T) -> Result<T, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Invalid request: {e}")))?;
    Ok(req)
}
