//! `AuthUser` extractor: pulls the session token from the request, verifies
//! it and checks revocation.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use flym_auth::Claims;
use flym_core::error::AppError;

use crate::cookies::ACCESS_COOKIE;
use crate::error::ApiError;
use crate::state::AppState;

/// Header a guest client may carry its token in.
pub const GUEST_TOKEN_HEADER: &str = "x-guest-token";

/// Verified claims of the caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the inner claims.
    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = Claims;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// First token found in `Authorization: Bearer`, the `at` cookie, or the
/// guest token header.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer
        .or_else(|| {
            CookieJar::from_headers(headers)
                .get(ACCESS_COOKIE)
                .map(|c| c.value().to_string())
        })
        .or_else(|| {
            headers
                .get(GUEST_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers)
            .ok_or_else(|| AppError::authentication("Authentication token required"))?;

        // A revocation store failure or timeout surfaces as 503, never as a pass.
        let claims = tokio::time::timeout(
            state.config.realtime.operation_timeout(),
            state.sessions.authenticate(&token),
        )
        .await
        .map_err(AppError::from)??;

        Ok(AuthUser(claims))
    }
}
