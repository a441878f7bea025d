use crate::access::TaskService;
use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::error::{Result, TaskError};
use crate::notifications::NotificationSender;
use crate::session::Session;
use crate::store::SqliteStore;
use crate::sync::{SharedTaskSync, TaskSync};
use std::sync::Arc;

/// Everything a front end needs: configuration, the opened store, and the
/// auth service holding the current session.
pub struct ClientContext {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub auth: AuthService<SqliteStore>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClientContext {
    /// Open the database and resume the remembered session, if any.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_path).await?);
        let auth = AuthService::new(Arc::clone(&store), &config);
        auth.restore().await?;

        tracing::debug!(db_path = %config.db_path.display(), "Client context ready");
        Ok(Self {
            config,
            store,
            auth,
        })
    }

    pub async fn from_env() -> Result<Self> {
        Self::open(AppConfig::from_env()?).await
    }

    pub fn current_session(&self) -> Option<Session> {
        self.auth.session_context().current()
    }

    /// The current session, or `AuthRequired` when nobody is signed in.
    pub fn require_session(&self) -> Result<Session> {
        self.current_session().ok_or(TaskError::AuthRequired)
    }

    pub fn task_service(&self) -> TaskService<SqliteStore> {
        TaskService::new(Arc::clone(&self.store), self.auth.session_context())
    }

    pub fn task_sync(&self, notifier: NotificationSender) -> TaskSync<SqliteStore> {
        TaskSync::spawn(self.task_service(), notifier)
    }

    pub fn shared_sync(&self, notifier: NotificationSender) -> SharedTaskSync<SqliteStore> {
        SharedTaskSync::spawn(self.task_service(), notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            db_path: dir.path().join("nested").join("taskshare.db"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let dir = TempDir::new().unwrap();
        let client = ClientContext::open(config(&dir)).await.unwrap();
        assert!(client.config.db_path.exists());
        assert!(client.current_session().is_none());
        assert!(matches!(
            client.require_session(),
            Err(TaskError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let client = ClientContext::open(config(&dir)).await.unwrap();
            client
                .auth
                .sign_up("gus@example.com", "secret1")
                .await
                .unwrap();
            client
                .auth
                .sign_in_with_password("gus@example.com", "secret1")
                .await
                .unwrap();
        }

        let client = ClientContext::open(config(&dir)).await.unwrap();
        let session = client.require_session().unwrap();
        assert_eq!(session.user.email, "gus@example.com");
        assert!(client.task_service().list().await.unwrap().is_empty());
    }
}
