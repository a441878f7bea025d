#[cfg(test)]
pub mod test_helpers {
    use crate::db::models::{NewShare, NewTask, SharedTask, Task, TaskPatch, User};
    use crate::error::{Result, TaskError};
    use crate::session::{Session, SessionController};
    use crate::store::{AuthStore, ChangeEvent, SqliteStore, Table, TaskStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    pub struct TestContext {
        pub store: SqliteStore,
        pub _temp_dir: TempDir,
    }

    impl TestContext {
        pub async fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let db_path = temp_dir.path().join(".taskshare").join("taskshare.db");
            let store = SqliteStore::open(&db_path).await.unwrap();

            Self {
                store,
                _temp_dir: temp_dir,
            }
        }

        pub async fn user(&self, email: &str) -> User {
            self.store.create_user(email, "unused-hash").await.unwrap()
        }

        pub async fn session(&self, user: &User) -> Session {
            self.store.create_session(user).await.unwrap()
        }

        /// A controller already signed in as a fresh user with `email`.
        pub async fn signed_in(&self, email: &str) -> (SessionController, User) {
            let user = self.user(email).await;
            let controller = SessionController::new();
            controller.sign_in(self.session(&user).await);
            (controller, user)
        }
    }

    /// Store wrapper whose calls can be made to fail or stall on demand and
    /// which counts `select_tasks` round trips.
    pub struct FlakyStore {
        pub inner: SqliteStore,
        pub fail_writes: AtomicBool,
        pub fail_reads: AtomicBool,
        pub task_loads: AtomicUsize,
        /// Milliseconds to hold the next task read after it has read; 0 for none
        pub stall_next_read_ms: AtomicU64,
    }

    impl FlakyStore {
        pub fn new(inner: SqliteStore) -> Arc<Self> {
            Arc::new(Self {
                inner,
                fail_writes: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
                task_loads: AtomicUsize::new(0),
                stall_next_read_ms: AtomicU64::new(0),
            })
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// The next `select_tasks` reads immediately but returns only after `delay`.
        pub fn stall_next_task_read(&self, delay: Duration) {
            self.stall_next_read_ms
                .store(delay.as_millis() as u64, Ordering::SeqCst);
        }

        pub fn task_loads(&self) -> usize {
            self.task_loads.load(Ordering::SeqCst)
        }

        fn check(&self, flag: &AtomicBool) -> Result<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(TaskError::Store("injected failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskStore for FlakyStore {
        async fn select_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
            self.task_loads.fetch_add(1, Ordering::SeqCst);
            self.check(&self.fail_reads)?;
            let rows = self.inner.select_tasks(owner_id).await;
            let stall = self.stall_next_read_ms.swap(0, Ordering::SeqCst);
            if stall > 0 {
                tokio::time::sleep(Duration::from_millis(stall)).await;
            }
            rows
        }

        async fn insert_task(&self, owner_id: &str, task: &NewTask) -> Result<Task> {
            self.check(&self.fail_writes)?;
            self.inner.insert_task(owner_id, task).await
        }

        async fn update_task(&self, caller_id: &str, id: &str, patch: &TaskPatch) -> Result<Task> {
            self.check(&self.fail_writes)?;
            self.inner.update_task(caller_id, id, patch).await
        }

        async fn delete_task(&self, caller_id: &str, id: &str) -> Result<()> {
            self.check(&self.fail_writes)?;
            self.inner.delete_task(caller_id, id).await
        }

        async fn user_id_by_email(&self, email: &str) -> Result<Option<String>> {
            self.inner.user_id_by_email(email).await
        }

        async fn insert_share(&self, share: &NewShare) -> Result<SharedTask> {
            self.check(&self.fail_writes)?;
            self.inner.insert_share(share).await
        }

        async fn select_shared(&self, grantee_id: &str) -> Result<Vec<SharedTask>> {
            self.check(&self.fail_reads)?;
            self.inner.select_shared(grantee_id).await
        }

        fn changes(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
            self.inner.changes(table)
        }
    }
}
