//! Invite handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;

use flym_auth::invite::InvitePreview;

use crate::cookies::{self, ACCESS_COOKIE};
use crate::dto::request::{AcceptInviteRequest, CreateInviteRequest, validated};
use crate::dto::response::{ApiResponse, GuestSessionResponse, InviteResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/invites
pub async fn create_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InviteResponse>>), ApiError> {
    let req = validated(req)?;
    let invite = state
        .invites
        .create(auth.claims(), req.kind, req.chat_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(InviteResponse {
            token: invite.token,
            kind: invite.kind,
            expires_at: invite.expires_at,
        })),
    ))
}

/// GET /api/invites/{token}
pub async fn preview_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<ApiResponse<InvitePreview>> {
    Json(ApiResponse::ok(state.invites.preview(&token)))
}

/// POST /api/invites/{token}/accept
pub async fn accept_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
    jar: CookieJar,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<(CookieJar, Json<ApiResponse<GuestSessionResponse>>), ApiError> {
    let req = validated(req)?;
    let accepted = state.invites.accept(&token, &req.guest_name).await?;

    let expires_at = accepted.token.expires_at();
    let jar = jar.add(cookies::persistent(
        ACCESS_COOKIE,
        accepted.token.token.clone(),
        expires_at,
        state.is_production(),
    ));

    Ok((
        jar,
        Json(ApiResponse::ok(GuestSessionResponse {
            guest_id: accepted.guest.id,
            name: accepted.guest.name,
            chat_id: accepted.room.id,
            access_token: accepted.token.token,
            expires_at,
        })),
    ))
}
