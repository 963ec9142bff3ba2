//! Session cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};

use flym_auth::{ClientType, TokenPair};

/// Access token cookie.
pub const ACCESS_COOKIE: &str = "at";
/// Refresh token cookie.
pub const REFRESH_COOKIE: &str = "rt";

fn base(name: &'static str, value: String, production: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(production)
        .same_site(if production { SameSite::None } else { SameSite::Lax })
        .path("/")
        .build()
}

/// A cookie that lives until `expires_at`.
pub fn persistent(
    name: &'static str,
    value: String,
    expires_at: DateTime<Utc>,
    production: bool,
) -> Cookie<'static> {
    let mut cookie = base(name, value, production);
    let secs = (expires_at - Utc::now()).num_seconds().max(0);
    cookie.set_max_age(time::Duration::seconds(secs));
    cookie
}

/// Set both session cookies. A web client's refresh cookie ends with the
/// browser session.
pub fn attach_pair(jar: CookieJar, pair: &TokenPair, production: bool) -> CookieJar {
    let access = persistent(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        pair.access_expires_at,
        production,
    );
    let refresh = match pair.client_type {
        ClientType::Pwa => persistent(
            REFRESH_COOKIE,
            pair.refresh_token.clone(),
            pair.refresh_expires_at,
            production,
        ),
        ClientType::Web => base(REFRESH_COOKIE, pair.refresh_token.clone(), production),
    };
    jar.add(access).add(refresh)
}

/// Expire both session cookies.
pub fn clear_pair(jar: CookieJar, production: bool) -> CookieJar {
    jar.remove(base(ACCESS_COOKIE, String::new(), production))
        .remove(base(REFRESH_COOKIE, String::new(), production))
}
