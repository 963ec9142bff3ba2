//! Chat room handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use flym_core::error::AppError;
use flym_entity::ParticipantKind;

use crate::dto::request::{CreateChatRequest, validated};
use crate::dto::response::{ApiResponse, ChatResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/chats
///
/// Returns the room whose members are exactly `participants`, creating it
/// on first use. The caller must be one of them.
pub async fn create_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChatResponse>>), ApiError> {
    if auth.role == ParticipantKind::Guest {
        return Err(AppError::authorization("Guests cannot open chats").into());
    }
    let req = validated(req)?;
    if !req.participants.contains(&auth.sub) {
        return Err(AppError::authorization("The caller must be a participant").into());
    }

    let room = state.repo.get_or_create_room(&req.participants).await?;
    tracing::debug!(chat_id = %room.id, user_id = %auth.sub, "Chat opened");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(room.into()))))
}
