//! Contract of the backing store: task and grant relations, credential and
//! session records, and a per-table change feed.

pub mod sqlite;

use crate::db::models::{NewShare, NewTask, SharedTask, Task, TaskPatch, User};
use crate::error::Result;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use sqlite::SqliteStore;

/// Capacity of each table's change channel before slow receivers lag.
const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    SharedTasks,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::SharedTasks => "shared_tasks",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
    /// Something changed but the row is unknown (another process, or a lagged feed).
    External,
}

/// Content-opaque notification that a row in `table` changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub operation: ChangeOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, operation: ChangeOperation, row_id: Option<String>) -> Self {
        Self {
            table,
            operation,
            row_id,
            at: Utc::now(),
        }
    }

    pub fn external(table: Table) -> Self {
        Self::new(table, ChangeOperation::External, None)
    }
}

/// Broadcast fan-out for the two watched tables.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tasks: broadcast::Sender<ChangeEvent>,
    shared_tasks: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tasks, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let (shared_tasks, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tasks,
            shared_tasks,
        }
    }

    fn sender(&self, table: Table) -> &broadcast::Sender<ChangeEvent> {
        match table {
            Table::Tasks => &self.tasks,
            Table::SharedTasks => &self.shared_tasks,
        }
    }

    pub fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        self.sender(table).subscribe()
    }

    /// Number of live receivers on `table`.
    pub fn receiver_count(&self, table: Table) -> usize {
        self.sender(table).receiver_count()
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No receivers is not an error: nobody is watching yet.
        let receivers = self.sender(event.table).send(event.clone()).unwrap_or(0);
        tracing::trace!(
            table = %event.table,
            operation = ?event.operation,
            receivers,
            "Published change event"
        );
    }
}

/// Task and grant relations plus their change feed.
///
/// Row-level access policy is the store's responsibility: implementations
/// only let `caller_id` touch the tasks it owns.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Tasks owned by `owner_id`, newest first.
    async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>>;

    async fn insert_task(&self, owner_id: &str, task: &NewTask) -> Result<Task>;

    async fn update_task(&self, caller_id: &str, id: &str, patch: &TaskPatch) -> Result<Task>;

    async fn delete_task(&self, caller_id: &str, id: &str) -> Result<()>;

    /// Resolve an account email. Absent accounts are `Ok(None)`.
    async fn user_id_by_email(&self, email: &str) -> Result<Option<String>>;

    async fn insert_share(&self, share: &NewShare) -> Result<SharedTask>;

    /// Grants where `grantee_id` is the recipient, each with its task embedded.
    async fn select_shared(&self, grantee_id: &str) -> Result<Vec<SharedTask>>;

    fn changes(&self, table: Table) -> broadcast::Receiver<ChangeEvent>;
}

/// A stored credential: the account plus its password hash.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

#[async_trait]
pub trait AuthStore: Send + Sync + 'static {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User>;

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>>;

    async fn create_session(&self, user: &User) -> Result<Session>;

    async fn find_session(&self, token: &str) -> Result<Option<Session>>;

    async fn delete_session(&self, token: &str) -> Result<()>;

    /// Persist (or forget, with `None`) the token of the session to resume next time.
    async fn remember_session(&self, token: Option<&str>) -> Result<()>;

    async fn remembered_session(&self) -> Result<Option<String>>;
}
