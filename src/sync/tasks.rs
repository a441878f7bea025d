use super::{drive, ListState, Mirror, SyncPhase, SyncSource};
use crate::access::{Subscription, TaskService};
use crate::db::models::{NewTask, SharedTask, Task, TaskPatch};
use crate::error::{Result, TaskError};
use crate::notifications::NotificationSender;
use crate::session::SessionContext;
use crate::store::{ChangeEvent, TaskStore};
use crate::view::{apply_view_now, TaskStats, ViewQuery};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// A write the store has confirmed, kept so it can be merged locally if the
/// confirming reload fails.
enum Confirmed {
    Upsert(Task),
    Remove(String),
    Nothing,
}

impl Confirmed {
    fn merge_into(self, items: &mut Vec<Task>) {
        match self {
            Confirmed::Upsert(task) => match items.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => items.insert(0, task),
            },
            Confirmed::Remove(id) => items.retain(|t| t.id != id),
            Confirmed::Nothing => {},
        }
    }
}

struct Inner<S: TaskStore> {
    service: TaskService<S>,
    mirror: Mirror<Task>,
    notifier: NotificationSender,
}

impl<S: TaskStore> Inner<S> {
    /// Full reload. `Err` only when the store was asked and failed.
    async fn load(&self) -> Result<()> {
        let epoch = self.mirror.epoch();
        let bound = self.mirror.bound_user();

        if bound.is_none() || self.service.session().user_id() != bound {
            // Signed out, or a session switch the driver has not rebound yet
            self.mirror.settle(epoch);
            return Ok(());
        }

        let ticket = self.mirror.ticket();
        match self.service.list().await {
            Ok(tasks) => {
                let count = tasks.len();
                if self.mirror.replace(epoch, ticket, tasks) {
                    tracing::debug!(count, ticket, "Tasks loaded");
                } else {
                    tracing::debug!(ticket, "Discarded stale task load");
                }
                Ok(())
            },
            Err(TaskError::AuthRequired) => {
                self.mirror.settle(epoch);
                Ok(())
            },
            Err(e) => {
                crate::log_error!(e, "load_tasks");
                self.notifier.error("Failed to load tasks");
                self.mirror.settle(epoch);
                Err(e)
            },
        }
    }

    async fn reconcile(&self, epoch: u64, confirmed: Confirmed) {
        if self.load().await.is_err() {
            self.mirror
                .modify_current(epoch, |items| confirmed.merge_into(items));
        }
    }
}

#[async_trait]
impl<S: TaskStore> SyncSource for Inner<S> {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn session(&self) -> &SessionContext {
        self.service.session()
    }

    fn bind(&self, user_id: Option<String>) {
        self.mirror.rebind(user_id);
    }

    fn subscribe(&self, tx: mpsc::UnboundedSender<ChangeEvent>) -> Subscription {
        self.service.subscribe_to_own_tasks(move |event| {
            let _ = tx.send(event);
        })
    }

    async fn reload(&self) {
        let _ = self.load().await;
    }
}

/// Authoritative in-memory list of the signed-in user's tasks.
///
/// Every successful write awaits a full reload before returning, so the
/// next read of the mirror reflects it. Failed writes leave the mirror as it
/// was. Must be created inside a tokio runtime; dropping it stops the
/// background driver and its change subscription.
pub struct TaskSync<S: TaskStore> {
    inner: Arc<Inner<S>>,
    driver: JoinHandle<()>,
}

impl<S: TaskStore> Drop for TaskSync<S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl<S: TaskStore> TaskSync<S> {
    pub fn spawn(service: TaskService<S>, notifier: NotificationSender) -> Self {
        let inner = Arc::new(Inner {
            service,
            mirror: Mirror::new(),
            notifier,
        });
        let driver = tokio::spawn(drive(Arc::clone(&inner)));
        Self { inner, driver }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.mirror.items()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.mirror.snapshot().phase
    }

    pub fn snapshot(&self) -> ListState<Task> {
        self.inner.mirror.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<Task>> {
        self.inner.mirror.subscribe()
    }

    /// Resolves once the mirror is loaded for the current session.
    pub async fn ready(&self) -> Result<ListState<Task>> {
        self.inner.mirror.ready(self.inner.service.session()).await
    }

    /// Derived, filtered and sorted view of the mirror.
    pub fn view(&self, query: &ViewQuery) -> Vec<Task> {
        apply_view_now(&self.inner.mirror.items(), query)
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.inner.mirror.items(), chrono::Local::now().date_naive())
    }

    pub async fn load_tasks(&self) -> Result<()> {
        self.inner.load().await
    }

    pub async fn create_task(&self, fields: NewTask) -> Result<Task> {
        let epoch = self.inner.mirror.epoch();
        match self.inner.service.create(fields).await {
            Ok(task) => {
                self.inner
                    .reconcile(epoch, Confirmed::Upsert(task.clone()))
                    .await;
                self.inner.notifier.success("Task created successfully");
                Ok(task)
            },
            Err(e) => {
                crate::log_error!(e, "create_task");
                self.inner
                    .notifier
                    .error(format!("Failed to create task: {}", e));
                Err(e)
            },
        }
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let epoch = self.inner.mirror.epoch();
        match self.inner.service.update(id, patch).await {
            Ok(task) => {
                self.inner
                    .reconcile(epoch, Confirmed::Upsert(task.clone()))
                    .await;
                self.inner.notifier.success("Task updated successfully");
                Ok(task)
            },
            Err(e) => {
                crate::log_error!(e, "update_task");
                self.inner
                    .notifier
                    .error(format!("Failed to update task: {}", e));
                Err(e)
            },
        }
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let epoch = self.inner.mirror.epoch();
        match self.inner.service.delete(id).await {
            Ok(()) => {
                self.inner
                    .reconcile(epoch, Confirmed::Remove(id.to_string()))
                    .await;
                self.inner.notifier.success("Task deleted successfully");
                Ok(())
            },
            Err(e) => {
                crate::log_error!(e, "delete_task");
                self.inner
                    .notifier
                    .error(format!("Failed to delete task: {}", e));
                Err(e)
            },
        }
    }

    pub async fn share_task(&self, id: &str, email: &str) -> Result<SharedTask> {
        let epoch = self.inner.mirror.epoch();
        match self.inner.service.share(id, email).await {
            Ok(grant) => {
                self.inner.reconcile(epoch, Confirmed::Nothing).await;
                self.inner
                    .notifier
                    .success(format!("Task shared with {}", email));
                Ok(grant)
            },
            Err(e) => {
                crate::log_error!(e, "share_task");
                self.inner
                    .notifier
                    .error(format!("Failed to share task: {}", e));
                Err(e)
            },
        }
    }

    /// Advance a task one step along todo -> in_progress -> done -> todo.
    pub async fn cycle_status(&self, id: &str) -> Result<Task> {
        let current = self
            .inner
            .mirror
            .items()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;

        self.update_task(id, TaskPatch::status(current.status.next()))
            .await
    }
}
