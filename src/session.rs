//! Explicit session handle.
//!
//! The authenticated identity is owned by a [`SessionController`] and handed
//! to services as a [`SessionContext`]. Consumers either read the current
//! session or subscribe to auth-state changes; there is no global lookup.

use crate::db::models::User;
use crate::error::{Result, TaskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
}

/// One auth-state change: the event that happened and the session after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthState {
    pub fn user_id(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.user.id.clone())
    }
}

/// Writing side of the session channel.
#[derive(Debug)]
pub struct SessionController {
    tx: watch::Sender<AuthState>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState {
            event: AuthEvent::InitialSession,
            session: None,
        });
        Self { tx }
    }

    pub fn publish(&self, event: AuthEvent, session: Option<Session>) {
        tracing::debug!(
            event = ?event,
            user_id = session.as_ref().map(|s| s.user.id.as_str()),
            "Auth state change"
        );
        self.tx.send_replace(AuthState { event, session });
    }

    pub fn sign_in(&self, session: Session) {
        self.publish(AuthEvent::SignedIn, Some(session));
    }

    pub fn sign_out(&self) {
        self.publish(AuthEvent::SignedOut, None);
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only handle to the current session, threaded into services at construction.
#[derive(Debug, Clone)]
pub struct SessionContext {
    rx: watch::Receiver<AuthState>,
}

impl SessionContext {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().session.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.rx.borrow().user_id()
    }

    /// The current session, or `AuthRequired`.
    pub fn require(&self) -> Result<Session> {
        self.current().ok_or(TaskError::AuthRequired)
    }

    /// A fresh receiver of auth-state changes, starting at the current state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        let mut rx = self.rx.clone();
        rx.mark_unchanged();
        rx
    }
}
