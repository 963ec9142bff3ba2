//! Client types and the token pair handed to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header a client sets to identify itself.
pub const CLIENT_DEVICE_HEADER: &str = "x-client-device";

/// Kind of client a session is issued to; selects the refresh lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Browser tab; short refresh lifetime.
    #[default]
    Web,
    /// Installed progressive web app; persistent refresh lifetime.
    Pwa,
}

impl ClientType {
    /// Parse the `X-Client-Device` header value. Anything other than
    /// `mobile-pwa` is a web client.
    pub fn from_device_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("mobile-pwa") => Self::Pwa,
            _ => Self::Web,
        }
    }
}

/// Access + refresh tokens issued together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token expiration timestamp.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiration timestamp.
    pub refresh_expires_at: DateTime<Utc>,
    /// Client type the pair was issued for.
    pub client_type: ClientType,
}
