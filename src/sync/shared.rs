use super::{drive, ListState, Mirror, SyncPhase, SyncSource};
use crate::access::{Subscription, TaskService};
use crate::db::models::SharedTask;
use crate::error::Result;
use crate::notifications::NotificationSender;
use crate::session::SessionContext;
use crate::store::{ChangeEvent, TaskStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

struct Inner<S: TaskStore> {
    service: TaskService<S>,
    mirror: Mirror<SharedTask>,
    notifier: NotificationSender,
}

impl<S: TaskStore> Inner<S> {
    async fn load(&self) -> Result<()> {
        let epoch = self.mirror.epoch();
        let bound = self.mirror.bound_user();

        if bound.is_none() || self.service.session().user_id() != bound {
            self.mirror.settle(epoch);
            return Ok(());
        }

        let ticket = self.mirror.ticket();
        match self.service.list_shared().await {
            Ok(grants) => {
                if !self.mirror.replace(epoch, ticket, grants) {
                    tracing::debug!(ticket, "Discarded stale shared-task load");
                }
                Ok(())
            },
            Err(e) => {
                crate::log_error!(e, "load_shared_tasks");
                self.notifier.error("Failed to load shared tasks");
                self.mirror.settle(epoch);
                Err(e)
            },
        }
    }
}

#[async_trait]
impl<S: TaskStore> SyncSource for Inner<S> {
    fn name(&self) -> &'static str {
        "shared_tasks"
    }

    fn session(&self) -> &SessionContext {
        self.service.session()
    }

    fn bind(&self, user_id: Option<String>) {
        self.mirror.rebind(user_id);
    }

    fn subscribe(&self, tx: mpsc::UnboundedSender<ChangeEvent>) -> Subscription {
        self.service.subscribe_to_shared_tasks(move |event| {
            let _ = tx.send(event);
        })
    }

    async fn reload(&self) {
        let _ = self.load().await;
    }
}

/// Read-only mirror of the grants made to the signed-in user.
///
/// Repeated grants of one task appear as separate entries.
pub struct SharedTaskSync<S: TaskStore> {
    inner: Arc<Inner<S>>,
    driver: JoinHandle<()>,
}

impl<S: TaskStore> Drop for SharedTaskSync<S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl<S: TaskStore> SharedTaskSync<S> {
    pub fn spawn(service: TaskService<S>, notifier: NotificationSender) -> Self {
        let inner = Arc::new(Inner {
            service,
            mirror: Mirror::new(),
            notifier,
        });
        let driver = tokio::spawn(drive(Arc::clone(&inner)));
        Self { inner, driver }
    }

    pub fn shared_tasks(&self) -> Vec<SharedTask> {
        self.inner.mirror.items()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.mirror.snapshot().phase
    }

    pub fn snapshot(&self) -> ListState<SharedTask> {
        self.inner.mirror.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<SharedTask>> {
        self.inner.mirror.subscribe()
    }

    pub async fn ready(&self) -> Result<ListState<SharedTask>> {
        self.inner.mirror.ready(self.inner.service.session()).await
    }

    pub async fn load_shared_tasks(&self) -> Result<()> {
        self.inner.load().await
    }
}
