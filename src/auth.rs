//! Account and session management on top of an [`AuthStore`].

use crate::config::AppConfig;
use crate::db::models::User;
use crate::error::{Result, TaskError};
use crate::session::{AuthEvent, AuthState, Session, SessionContext, SessionController};
use crate::store::AuthStore;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

const MIN_PASSWORD_LEN: usize = 6;

/// Where to send the browser for a third-party sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthRedirect {
    pub provider: String,
    pub url: String,
}

/// Argon2id with a random salt, stored as a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TaskError::Store(format!("Password hashing failed: {}", e)))
}

/// A stored value that does not parse never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(TaskError::ValidationError(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(())
}

pub struct AuthService<A: AuthStore> {
    store: Arc<A>,
    controller: SessionController,
    oauth_url: String,
    redirect_url: String,
}

impl<A: AuthStore> AuthService<A> {
    pub fn new(store: Arc<A>, config: &AppConfig) -> Self {
        Self {
            store,
            controller: SessionController::new(),
            oauth_url: config.oauth_url.clone(),
            redirect_url: config.redirect_url.clone(),
        }
    }

    /// Handle for services that act on behalf of the signed-in user.
    pub fn session_context(&self) -> SessionContext {
        self.controller.context()
    }

    pub fn on_auth_state_change(&self) -> watch::Receiver<AuthState> {
        self.controller.context().subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.controller.context().current().map(|s| s.user)
    }

    /// Resume the remembered session, if it is still valid.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let session = match self.store.remembered_session().await? {
            Some(token) => {
                let found = self.store.find_session(&token).await?;
                if found.is_none() {
                    tracing::debug!("Remembered session no longer exists");
                    self.store.remember_session(None).await?;
                }
                found
            },
            None => None,
        };
        self.controller
            .publish(AuthEvent::InitialSession, session.clone());
        Ok(session)
    }

    /// Register an account. Does not sign in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        validate_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(TaskError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user = self
            .store
            .create_user(email, &hash_password(password)?)
            .await?;
        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let credentials = self
            .store
            .find_credentials(email)
            .await?
            .ok_or(TaskError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash) {
            tracing::warn!(email, "Rejected sign-in");
            return Err(TaskError::InvalidCredentials);
        }

        let session = self.store.create_session(&credentials.user).await?;
        self.store
            .remember_session(Some(&session.access_token))
            .await?;
        self.controller.sign_in(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Build the provider's authorize URL; completing the round trip is the provider's job.
    pub fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect> {
        let provider = provider.trim().to_lowercase();
        if provider.is_empty() {
            return Err(TaskError::InvalidInput("OAuth provider is required".to_string()));
        }

        let url = Url::parse_with_params(
            &self.oauth_url,
            [
                ("provider", provider.as_str()),
                ("redirect_to", self.redirect_url.as_str()),
            ],
        )
        .map_err(|e| {
            TaskError::InvalidInput(format!("Invalid OAuth URL '{}': {}", self.oauth_url, e))
        })?;

        Ok(OAuthRedirect {
            provider,
            url: url.to_string(),
        })
    }

    pub async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.controller.context().current() {
            self.store.delete_session(&session.access_token).await?;
            tracing::info!(user_id = %session.user.id, "Signed out");
        }
        self.store.remember_session(None).await?;
        self.controller.sign_out();
        Ok(())
    }
}
