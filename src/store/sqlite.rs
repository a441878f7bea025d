use super::{AuthStore, ChangeEvent, ChangeFeed, ChangeOperation, Credentials, Table, TaskStore};
use crate::db::models::{
    NewShare, NewTask, Permission, Priority, SharedTask, Task, TaskPatch, TaskStatus, User,
};
use crate::db::{create_pool, run_migrations};
use crate::error::{Result, TaskError};
use crate::session::Session;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, created_at, updated_at, owner_id";

const CURRENT_SESSION_KEY: &str = "current_session";

/// SQLite-backed store. Writes made through this handle are announced on the
/// change feed; commits from other processes are picked up by
/// [`SqliteStore::watch_external_changes`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

#[derive(FromRow)]
struct SharedTaskRow {
    id: String,
    task_id: String,
    shared_with: String,
    shared_by: String,
    permission: Permission,
    created_at: DateTime<Utc>,
    t_id: Option<String>,
    t_title: Option<String>,
    t_description: Option<String>,
    t_status: Option<TaskStatus>,
    t_priority: Option<Priority>,
    t_due_date: Option<NaiveDate>,
    t_created_at: Option<DateTime<Utc>>,
    t_updated_at: Option<DateTime<Utc>>,
    t_owner_id: Option<String>,
}

impl From<SharedTaskRow> for SharedTask {
    fn from(row: SharedTaskRow) -> Self {
        let task = match (
            row.t_id,
            row.t_title,
            row.t_status,
            row.t_priority,
            row.t_created_at,
            row.t_owner_id,
        ) {
            (Some(id), Some(title), Some(status), Some(priority), Some(created_at), Some(owner_id)) => {
                Some(Task {
                    id,
                    title,
                    description: row.t_description,
                    status,
                    priority,
                    due_date: row.t_due_date,
                    created_at,
                    updated_at: row.t_updated_at,
                    owner_id,
                })
            },
            _ => None,
        };

        SharedTask {
            id: row.id,
            task_id: row.task_id,
            shared_with: row.shared_with,
            shared_by: row.shared_by,
            permission: row.permission,
            created_at: row.created_at,
            task,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    created_at: DateTime<Utc>,
    id: String,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            user: User {
                id: row.id,
                email: row.email,
                full_name: row.full_name,
                avatar_url: row.avatar_url,
            },
            access_token: row.token,
            created_at: row.created_at,
        }
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    /// Open (creating if missing) and migrate the database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let pool = create_pool(db_path).await?;
        run_migrations(&pool).await?;
        tracing::debug!(db_path = %db_path.display(), "Opened task store");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Live change-feed receivers on `table`.
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.feed.receiver_count(table)
    }

    /// Feed this store announces its writes on.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    async fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    /// Poll `PRAGMA data_version` on a dedicated connection and announce an
    /// `External` change on both tables whenever another connection commits.
    ///
    /// Commits made through this store's own pool are seen too, so they are
    /// announced twice; subscribers only ever reload, so that is harmless.
    pub fn watch_external_changes(&self, interval: Duration) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let feed = self.feed.clone();

        tokio::spawn(async move {
            let mut conn = match pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "External change watcher could not acquire a connection");
                    return;
                },
            };

            let mut last_version: Option<i64> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let version: i64 = match sqlx::query_scalar("PRAGMA data_version")
                    .fetch_one(&mut *conn)
                    .await
                {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to poll data_version");
                        continue;
                    },
                };

                if last_version.is_some_and(|last| last != version) {
                    tracing::debug!(version, "External commit detected");
                    feed.publish(ChangeEvent::external(Table::Tasks));
                    feed.publish(ChangeEvent::external(Table::SharedTasks));
                }
                last_version = Some(version);
            }
        })
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            TASK_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn insert_task(&self, owner_id: &str, task: &NewTask) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date, created_at, owner_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(now)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        let stored = self
            .fetch_task(&id)
            .await?
            .ok_or_else(|| TaskError::Store(format!("Inserted task {} vanished", id)))?;

        self.feed.publish(ChangeEvent::new(
            Table::Tasks,
            ChangeOperation::Insert,
            Some(id),
        ));
        Ok(stored)
    }

    async fn update_task(&self, caller_id: &str, id: &str, patch: &TaskPatch) -> Result<Task> {
        let mut tx = self.pool.begin().await?;

        let mut task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = ? AND owner_id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(caller_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;

        task.apply_patch(patch);
        task.updated_at = Some(Utc::now());

        sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, status = ?, priority = ?, due_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.feed.publish(ChangeEvent::new(
            Table::Tasks,
            ChangeOperation::Update,
            Some(id.to_string()),
        ));
        Ok(task)
    }

    async fn delete_task(&self, caller_id: &str, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(caller_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TaskError::TaskNotFound(id.to_string()));
        }

        self.feed.publish(ChangeEvent::new(
            Table::Tasks,
            ChangeOperation::Delete,
            Some(id.to_string()),
        ));
        // Grants on the task went with it (ON DELETE CASCADE)
        self.feed.publish(ChangeEvent::external(Table::SharedTasks));
        Ok(())
    }

    async fn user_id_by_email(&self, email: &str) -> Result<Option<String>> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn insert_share(&self, share: &NewShare) -> Result<SharedTask> {
        let owned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ? AND owner_id = ?")
                .bind(&share.task_id)
                .bind(&share.shared_by)
                .fetch_one(&self.pool)
                .await?;
        if owned == 0 {
            return Err(TaskError::TaskNotFound(share.task_id.clone()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO shared_tasks (id, task_id, shared_with, shared_by, permission, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&share.task_id)
        .bind(&share.shared_with)
        .bind(&share.shared_by)
        .bind(share.permission)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.feed.publish(ChangeEvent::new(
            Table::SharedTasks,
            ChangeOperation::Insert,
            Some(id.clone()),
        ));

        Ok(SharedTask {
            id,
            task_id: share.task_id.clone(),
            shared_with: share.shared_with.clone(),
            shared_by: share.shared_by.clone(),
            permission: share.permission,
            created_at: now,
            task: None,
        })
    }

    async fn select_shared(&self, grantee_id: &str) -> Result<Vec<SharedTask>> {
        let rows = sqlx::query_as::<_, SharedTaskRow>(
            r#"
            SELECT s.id, s.task_id, s.shared_with, s.shared_by, s.permission, s.created_at,
                   t.id AS t_id, t.title AS t_title, t.description AS t_description,
                   t.status AS t_status, t.priority AS t_priority, t.due_date AS t_due_date,
                   t.created_at AS t_created_at, t.updated_at AS t_updated_at,
                   t.owner_id AS t_owner_id
            FROM shared_tasks s
            LEFT JOIN tasks t ON t.id = s.task_id
            WHERE s.shared_with = ?
            ORDER BY s.created_at DESC, s.rowid DESC
            "#,
        )
        .bind(grantee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SharedTask::from).collect())
    }

    fn changes(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe(table)
    }
}

#[async_trait]
impl AuthStore for SqliteStore {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        if self.user_id_by_email(email).await?.is_some() {
            return Err(TaskError::EmailTaken(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            full_name: None,
            avatar_url: None,
        };

        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.email)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, String)>(
            "SELECT id, email, full_name, avatar_url, password_hash FROM users WHERE email = ?",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, email, full_name, avatar_url, password_hash)| Credentials {
                user: User {
                    id,
                    email,
                    full_name,
                    avatar_url,
                },
                password_hash,
            },
        ))
    }

    async fn create_session(&self, user: &User) -> Result<Session> {
        let bytes: [u8; 32] = rand::random();
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let now = Utc::now();

        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(&user.id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(Session {
            user: user.clone(),
            access_token: token,
            created_at: now,
        })
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.token, s.created_at, u.id, u.email, u.full_name, u.avatar_url
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Session::from))
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remember_session(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                sqlx::query(
                    r#"
                    INSERT INTO client_state (key, value) VALUES (?, ?)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(CURRENT_SESSION_KEY)
                .bind(token)
                .execute(&self.pool)
                .await?;
            },
            None => {
                sqlx::query("DELETE FROM client_state WHERE key = ?")
                    .bind(CURRENT_SESSION_KEY)
                    .execute(&self.pool)
                    .await?;
            },
        }
        Ok(())
    }

    async fn remembered_session(&self) -> Result<Option<String>> {
        let token = sqlx::query_scalar::<_, String>("SELECT value FROM client_state WHERE key = ?")
            .bind(CURRENT_SESSION_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }
}
