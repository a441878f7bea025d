use super::utils::{build_query, drain_notices, print_task_list};
use super::OutputOptions;
use crate::client::ClientContext;
use crate::error::{Result, TaskError};
use crate::notifications::NotificationSender;
use crate::view::apply_view_now;
use serde_json::json;

/// Live view: redraw the derived list every time either mirror changes.
pub async fn handle_watch_command(
    client: &ClientContext,
    search: Option<String>,
    filter: &str,
    sort: &str,
    output: OutputOptions,
) -> Result<()> {
    let session = client.require_session()?;
    let query = build_query(search, filter, sort)?;

    let (notifier, mut notices) = NotificationSender::channel();
    let tasks = client.task_sync(notifier.clone());
    let shared = client.shared_sync(notifier);
    let watcher = client
        .store
        .watch_external_changes(client.config.poll_interval);

    let mut task_rx = tasks.subscribe();
    let mut shared_rx = shared.subscribe();

    tracing::info!(user = %session.user.email, "Watching tasks");
    if !output.json && !output.quiet {
        println!("Watching tasks for {} (Ctrl-C to stop)", session.user.email);
    }

    let result = loop {
        {
            let state = task_rx.borrow_and_update().clone();
            let grants = shared_rx.borrow_and_update().clone();
            if state.is_ready() {
                let view = apply_view_now(&state.items, &query);
                if output.json {
                    println!(
                        "{}",
                        json!({
                            "revision": state.revision,
                            "tasks": view,
                            "shared_count": grants.items.len(),
                        })
                    );
                } else {
                    println!();
                    println!("── {} ──", chrono::Local::now().format("%H:%M:%S"));
                    print_task_list(&view, state.items.len());
                    println!("Shared with you: {}", grants.items.len());
                }
            }
        }
        drain_notices(&mut notices, output.quiet || output.json);

        tokio::select! {
            changed = task_rx.changed() => {
                if changed.is_err() {
                    break Err(TaskError::Store("task synchronization stopped".to_string()));
                }
            }
            changed = shared_rx.changed() => {
                if changed.is_err() {
                    break Err(TaskError::Store("shared-task synchronization stopped".to_string()));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                break Ok(());
            }
        }
    };

    watcher.abort();
    result
}
