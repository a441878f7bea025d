use std::sync::Arc;
use std::time::Duration;
use taskshare::access::TaskService;
use taskshare::auth::AuthService;
use taskshare::config::AppConfig;
use taskshare::db::models::{NewTask, Priority, TaskPatch, TaskStatus};
use taskshare::notifications::NotificationSender;
use taskshare::store::SqliteStore;
use taskshare::sync::{SharedTaskSync, TaskSync};
use taskshare::view::{SortKey, TaskFilter, ViewQuery};
use tempfile::TempDir;

struct Setup {
    _temp_dir: TempDir,
    config: AppConfig,
}

fn setup() -> Setup {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig {
        db_path: temp_dir.path().join("taskshare.db"),
        poll_interval: Duration::from_millis(50),
        ..AppConfig::default()
    };
    Setup {
        _temp_dir: temp_dir,
        config,
    }
}

async fn signed_in(
    config: &AppConfig,
    email: &str,
) -> (Arc<SqliteStore>, AuthService<SqliteStore>) {
    let store = Arc::new(SqliteStore::open(&config.db_path).await.unwrap());
    let auth = AuthService::new(Arc::clone(&store), config);
    let _ = auth.sign_up(email, "secret1").await;
    auth.sign_in_with_password(email, "secret1").await.unwrap();
    (store, auth)
}

#[tokio::test]
async fn test_writes_are_visible_in_the_view_on_return() {
    let env = setup();
    let (store, auth) = signed_in(&env.config, "alice@example.com").await;
    let sync = TaskSync::spawn(
        TaskService::new(store, auth.session_context()),
        NotificationSender::default(),
    );
    sync.ready().await.unwrap();

    sync.create_task(NewTask {
        priority: Priority::Low,
        ..NewTask::titled("low one")
    })
    .await
    .unwrap();
    let high = sync
        .create_task(NewTask {
            priority: Priority::High,
            ..NewTask::titled("high one")
        })
        .await
        .unwrap();

    let by_priority = sync.view(&ViewQuery {
        sort: SortKey::Priority,
        ..ViewQuery::default()
    });
    assert_eq!(by_priority[0].id, high.id);

    sync.update_task(&high.id, TaskPatch::status(TaskStatus::Done))
        .await
        .unwrap();
    let done = sync.view(&ViewQuery {
        filter: TaskFilter::Status(TaskStatus::Done),
        ..ViewQuery::default()
    });
    assert_eq!(done.len(), 1);
    assert_eq!(sync.stats().done, 1);
}

#[tokio::test]
async fn test_changes_from_another_process_reach_the_mirror() {
    let env = setup();
    let (store, auth) = signed_in(&env.config, "alice@example.com").await;
    let watcher = store.watch_external_changes(env.config.poll_interval);
    let sync = TaskSync::spawn(
        TaskService::new(Arc::clone(&store), auth.session_context()),
        NotificationSender::default(),
    );
    sync.ready().await.unwrap();
    let mut rx = sync.subscribe();

    // A second store on the same file stands in for another process
    let (other_store, other_auth) = signed_in(&env.config, "alice@example.com").await;
    let other = TaskService::new(other_store, other_auth.session_context());
    other.create(NewTask::titled("from elsewhere")).await.unwrap();

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.items.iter().any(|t| t.title == "from elsewhere")),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(state.items.len(), 1);

    watcher.abort();
}

#[tokio::test]
async fn test_delete_revokes_grants_for_recipient() {
    let env = setup();
    let (store, bob_auth) = signed_in(&env.config, "bob@example.com").await;
    let (alice_store, alice_auth) = signed_in(&env.config, "alice@example.com").await;

    let alice = TaskSync::spawn(
        TaskService::new(alice_store, alice_auth.session_context()),
        NotificationSender::default(),
    );
    alice.ready().await.unwrap();
    let watcher = store.watch_external_changes(env.config.poll_interval);
    let shared = SharedTaskSync::spawn(
        TaskService::new(Arc::clone(&store), bob_auth.session_context()),
        NotificationSender::default(),
    );
    shared.ready().await.unwrap();
    let mut rx = shared.subscribe();

    let task = alice.create_task(NewTask::titled("joint")).await.unwrap();
    alice.share_task(&task.id, "bob@example.com").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.items.len() == 1))
        .await
        .unwrap()
        .unwrap();

    alice.delete_task(&task.id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.items.is_empty()))
        .await
        .unwrap()
        .unwrap();

    watcher.abort();
}

#[tokio::test]
async fn test_sign_out_clears_the_mirror() {
    let env = setup();
    let (store, auth) = signed_in(&env.config, "alice@example.com").await;
    let sync = TaskSync::spawn(
        TaskService::new(store, auth.session_context()),
        NotificationSender::default(),
    );
    sync.ready().await.unwrap();
    sync.create_task(NewTask::titled("private")).await.unwrap();
    assert_eq!(sync.tasks().len(), 1);

    auth.sign_out().await.unwrap();
    let state = tokio::time::timeout(Duration::from_secs(5), sync.ready())
        .await
        .unwrap()
        .unwrap();
    assert!(state.items.is_empty());
    assert_eq!(state.user_id, None);
}
