//! Password login for registered users.

use std::sync::Arc;

use tracing::{debug, info};

use flym_core::error::AppError;
use flym_core::result::AppResult;
use flym_database::ChatRepository;
use flym_entity::User;

use crate::jwt::TokenSubject;
use crate::password::PasswordHasher;

use super::client::{ClientType, TokenPair};
use super::manager::SessionManager;

/// Checks email and password credentials and opens a session.
#[derive(Debug, Clone)]
pub struct LoginService {
    repo: Arc<dyn ChatRepository>,
    sessions: Arc<SessionManager>,
    hasher: PasswordHasher,
}

fn invalid_credentials() -> AppError {
    AppError::authentication("Invalid email or password")
}

impl LoginService {
    pub fn new(repo: Arc<dyn ChatRepository>, sessions: Arc<SessionManager>) -> Self {
        Self {
            repo,
            sessions,
            hasher: PasswordHasher::new(),
        }
    }

    /// Verify the credentials and issue a token pair for `client`.
    ///
    /// An unknown email, an account without a password and a wrong password
    /// all fail with the same authentication error.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: ClientType,
    ) -> AppResult<(User, TokenPair)> {
        let user = self
            .repo
            .find_user_by_email(email)
            .await?
            .ok_or_else(invalid_credentials)?;
        let hash = user.password_hash.clone().ok_or_else(|| {
            debug!(user_id = %user.id, "Login for an account without a password");
            invalid_credentials()
        })?;

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("Password check task failed: {e}")))??;
        if !matches {
            debug!(user_id = %user.id, "Wrong password");
            return Err(invalid_credentials());
        }

        let pair = self
            .sessions
            .issue_pair(&TokenSubject::user(user.id, user.name.clone()), client)?;
        info!(user_id = %user.id, ?client, "User logged in");
        Ok((user, pair))
    }
}
