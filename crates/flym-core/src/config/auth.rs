//! Authentication configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token signing and lifetime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for JWT signing (HMAC-SHA256). Must be non-empty.
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: i64,
    /// Refresh token TTL for browser clients, in minutes.
    #[serde(default = "default_refresh_web_ttl")]
    pub refresh_ttl_web_minutes: i64,
    /// Refresh token TTL for installed PWA clients, in hours.
    #[serde(default = "default_refresh_pwa_ttl")]
    pub refresh_ttl_pwa_hours: i64,
    /// Invite link validity in hours.
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_hours: i64,
    /// Guest identity lifetime in hours.
    #[serde(default = "default_guest_ttl")]
    pub guest_ttl_hours: i64,
}

impl AuthConfig {
    /// Rejects configurations that cannot sign tokens.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must be set"));
        }
        if self.access_ttl_minutes <= 0 || self.refresh_ttl_web_minutes <= 0 {
            return Err(AppError::configuration("token lifetimes must be positive"));
        }
        Ok(())
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes)
    }

    /// Refresh token lifetime for browser sessions.
    pub fn refresh_ttl_web(&self) -> Duration {
        Duration::minutes(self.refresh_ttl_web_minutes)
    }

    /// Refresh token lifetime for PWA sessions.
    pub fn refresh_ttl_pwa(&self) -> Duration {
        Duration::hours(self.refresh_ttl_pwa_hours)
    }

    /// Invite token lifetime.
    pub fn invite_ttl(&self) -> Duration {
        Duration::hours(self.invite_ttl_hours)
    }

    /// Guest identity lifetime.
    pub fn guest_ttl(&self) -> Duration {
        Duration::hours(self.guest_ttl_hours)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_web_minutes: default_refresh_web_ttl(),
            refresh_ttl_pwa_hours: default_refresh_pwa_ttl(),
            invite_ttl_hours: default_invite_ttl(),
            guest_ttl_hours: default_guest_ttl(),
        }
    }
}

fn default_access_ttl() -> i64 {
    15
}

fn default_refresh_web_ttl() -> i64 {
    30
}

fn default_refresh_pwa_ttl() -> i64 {
    168
}

fn default_invite_ttl() -> i64 {
    24
}

fn default_guest_ttl() -> i64 {
    12
}
