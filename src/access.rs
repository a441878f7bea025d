//! Task access layer: one method per store interaction, scoped to the
//! session it was constructed with. Owns no state of its own.

use crate::db::models::{NewShare, NewTask, Permission, SharedTask, Task, TaskPatch};
use crate::error::{Result, TaskError};
use crate::session::SessionContext;
use crate::store::{ChangeEvent, Table, TaskStore};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Live change-feed registration. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops delivery for good.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!(table = %self.table, "Change subscription disposed");
    }
}

pub struct TaskService<S: TaskStore> {
    store: Arc<S>,
    session: SessionContext,
}

impl<S: TaskStore> Clone for TaskService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            session: self.session.clone(),
        }
    }
}

impl<S: TaskStore> TaskService<S> {
    pub fn new(store: Arc<S>, session: SessionContext) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// All tasks owned by the signed-in user, newest first.
    pub async fn list(&self) -> Result<Vec<Task>> {
        let session = self.session.require()?;
        self.store.select_tasks(session.user_id()).await
    }

    /// Insert a task owned by the signed-in user.
    pub async fn create(&self, fields: NewTask) -> Result<Task> {
        fields.validate()?;
        let session = self.session.require()?;
        let task = self.store.insert_task(session.user_id(), &fields).await?;
        crate::log_task_operation!("create", task.id.as_str());
        Ok(task)
    }

    /// Apply a partial patch. Whether the caller may touch the row is the store's call.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        patch.validate()?;
        let session = self.session.require()?;
        let task = self
            .store
            .update_task(session.user_id(), id, &patch)
            .await?;
        crate::log_task_operation!("update", id);
        Ok(task)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let session = self.session.require()?;
        self.store.delete_task(session.user_id(), id).await?;
        crate::log_task_operation!("delete", id);
        Ok(())
    }

    /// Grant read access on `task_id` to the account registered under `email`.
    ///
    /// Repeated shares to the same recipient each produce a new grant.
    pub async fn share(&self, task_id: &str, email: &str) -> Result<SharedTask> {
        let session = self.session.require()?;

        let recipient = match self.store.user_id_by_email(email).await? {
            Some(id) => id,
            None => {
                tracing::warn!(email, "Share recipient not found");
                return Err(TaskError::RecipientNotFound(email.to_string()));
            },
        };

        let grant = self
            .store
            .insert_share(&NewShare {
                task_id: task_id.to_string(),
                shared_with: recipient,
                shared_by: session.user_id().to_string(),
                permission: Permission::Read,
            })
            .await?;
        crate::log_task_operation!("share", task_id, email);
        Ok(grant)
    }

    /// Grants to the signed-in user. Without a session this is empty, not an error.
    pub async fn list_shared(&self) -> Result<Vec<SharedTask>> {
        let Some(session) = self.session.current() else {
            return Ok(Vec::new());
        };
        self.store.select_shared(session.user_id()).await
    }

    pub fn subscribe_to_own_tasks<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        self.subscribe(Table::Tasks, handler)
    }

    pub fn subscribe_to_shared_tasks<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        self.subscribe(Table::SharedTasks, handler)
    }

    fn subscribe<F>(&self, table: Table, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let mut rx = self.store.changes(table);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(table = %table, skipped, "Change feed lagged");
                        handler(ChangeEvent::external(table));
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!(table = %table, "Change subscription established");
        Subscription { table, handle }
    }
}
