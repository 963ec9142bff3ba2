//! WebSocket upgrade authentication.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use flym_auth::SessionManager;
use flym_core::error::{AppError, ErrorKind};
use flym_entity::Identity;

/// Close code: no token presented.
pub const CLOSE_MISSING_TOKEN: u16 = 4000;
/// Close code: invalid, expired or revoked token.
pub const CLOSE_INVALID_TOKEN: u16 = 4001;
/// Close code: unexpected server error.
pub const CLOSE_INTERNAL_ERROR: u16 = 4002;
/// Close code: server shutdown or unresponsive peer.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// The identity an upgrade authenticated as.
#[derive(Debug, Clone)]
pub struct AuthenticatedPeer {
    pub identity: Identity,
    /// Room a guest token is scoped to.
    pub room_scope: Option<Uuid>,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Why an upgrade was refused.
#[derive(Debug)]
pub enum UpgradeRejection {
    MissingToken,
    InvalidToken(AppError),
    /// The revocation check could not run.
    Unavailable(AppError),
}

impl UpgradeRejection {
    /// The close code sent to the client.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::MissingToken => CLOSE_MISSING_TOKEN,
            Self::InvalidToken(_) => CLOSE_INVALID_TOKEN,
            Self::Unavailable(_) => CLOSE_INTERNAL_ERROR,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::MissingToken => "Authentication token required",
            Self::InvalidToken(_) => "Invalid or expired token",
            Self::Unavailable(_) => "Authentication temporarily unavailable",
        }
    }
}

/// Turns the token presented at upgrade into an [`AuthenticatedPeer`].
#[derive(Debug, Clone)]
pub struct SocketAuthenticator {
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl SocketAuthenticator {
    pub fn new(sessions: Arc<SessionManager>, timeout: Duration) -> Self {
        Self { sessions, timeout }
    }

    /// Authenticate with the query-string token, falling back to the
    /// cookie token.
    ///
    /// Revoked tokens are refused. If the revocation store cannot answer,
    /// the upgrade is refused as well.
    pub async fn authenticate(
        &self,
        query_token: Option<&str>,
        cookie_token: Option<&str>,
    ) -> Result<AuthenticatedPeer, UpgradeRejection> {
        let token = query_token
            .or(cookie_token)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(UpgradeRejection::MissingToken)?;

        let claims = match tokio::time::timeout(self.timeout, self.sessions.authenticate(token)).await {
            Ok(Ok(claims)) => claims,
            Ok(Err(e)) if e.kind == ErrorKind::Authentication => {
                debug!(error = %e, "Socket token rejected");
                return Err(UpgradeRejection::InvalidToken(e));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Revocation check failed during upgrade");
                return Err(UpgradeRejection::Unavailable(e));
            }
            Err(elapsed) => {
                warn!("Revocation check timed out during upgrade");
                return Err(UpgradeRejection::Unavailable(elapsed.into()));
            }
        };

        Ok(AuthenticatedPeer {
            identity: claims.identity(),
            room_scope: claims.room,
            token_id: claims.jti,
            expires_at: claims.expires_at(),
        })
    }
}
