//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use flym_auth::{InviteService, LoginService, SessionManager};
use flym_cache::CacheManager;
use flym_core::config::AppConfig;
use flym_database::ChatRepository;
use flym_realtime::RealtimeEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Chat persistence
    pub repo: Arc<dyn ChatRepository>,
    /// Cache manager backing token revocation
    pub cache: Arc<CacheManager>,
    /// Session token lifecycle
    pub sessions: Arc<SessionManager>,
    /// Password login
    pub logins: Arc<LoginService>,
    /// Invite links and guest admission
    pub invites: Arc<InviteService>,
    /// WebSocket realtime engine
    pub realtime: RealtimeEngine,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Whether session cookies must be `Secure` with `SameSite=None`.
    pub fn is_production(&self) -> bool {
        self.config.server.is_production()
    }
}
