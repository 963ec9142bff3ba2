//! Session handlers: login, refresh, logout, me.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use flym_auth::ClientType;
use flym_auth::session::client::CLIENT_DEVICE_HEADER;
use flym_core::error::AppError;

use crate::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::dto::request::{LoginRequest, RefreshRequest, validated};
use crate::dto::response::{
    ApiResponse, LoginResponse, MeResponse, MessageResponse, SessionResponse,
};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

fn client_type(headers: &HeaderMap) -> ClientType {
    ClientType::from_device_header(
        headers
            .get(CLIENT_DEVICE_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), ApiError> {
    let req = validated(req)?;
    let (user, pair) = state
        .logins
        .login(&req.email, &req.password, client_type(&headers))
        .await?;

    let jar = cookies::attach_pair(jar, &pair, state.is_production());
    Ok((
        jar,
        Json(ApiResponse::ok(LoginResponse {
            user: user.into(),
            session: pair.into(),
        })),
    ))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), ApiError> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?
    };

    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(from_body.refresh_token)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::authentication("Refresh token required"))?;

    let pair = state
        .sessions
        .refresh(&token, client_type(&headers))
        .await?;

    let jar = cookies::attach_pair(jar, &pair, state.is_production());
    Ok((jar, Json(ApiResponse::ok(SessionResponse::from(pair)))))
}

/// POST /api/auth/logout
///
/// Always succeeds; whatever tokens were presented are revoked on a best
/// effort basis.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<MessageResponse>>) {
    let access = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    if let Err(e) = state
        .sessions
        .logout(access.as_deref(), refresh.as_deref())
        .await
    {
        tracing::warn!(error = %e, "Token revocation failed during logout");
    }

    let jar = cookies::clear_pair(jar, state.is_production());
    (
        jar,
        Json(ApiResponse::ok(MessageResponse {
            message: "Logged out successfully".to_string(),
        })),
    )
}

/// GET /api/auth/me
pub async fn me(auth: AuthUser) -> Json<ApiResponse<MeResponse>> {
    Json(ApiResponse::ok(MeResponse {
        id: auth.sub,
        name: auth.name.clone(),
        kind: auth.role,
        chat_id: auth.room,
        expires_at: auth.expires_at(),
    }))
}
