use super::utils::{
    build_query, confirm, drain_notices, parse_due_date, print_json, print_stats, print_task,
    print_task_list,
};
use super::OutputOptions;
use crate::cli::TaskCommands;
use crate::client::ClientContext;
use crate::db::models::{NewTask, TaskPatch};
use crate::error::{Result, TaskError};
use crate::notifications::NotificationSender;
use crate::store::SqliteStore;
use crate::sync::TaskSync;
use serde_json::json;
use tokio::sync::mpsc;

/// A signed-in task mirror, loaded and ready, plus the notices it raises.
async fn open_sync(
    client: &ClientContext,
) -> Result<(TaskSync<SqliteStore>, mpsc::UnboundedReceiver<crate::notifications::Notice>)> {
    client.require_session()?;
    let (notifier, notices) = NotificationSender::channel();
    let sync = client.task_sync(notifier);
    sync.ready().await?;
    Ok((sync, notices))
}

/// Handle all `taskshare task` subcommands
pub async fn handle_task_command(
    client: &ClientContext,
    cmd: TaskCommands,
    output: OutputOptions,
) -> Result<()> {
    let (sync, mut notices) = open_sync(client).await?;

    match cmd {
        TaskCommands::Add {
            title,
            description,
            status,
            priority,
            due,
        } => {
            let fields = NewTask {
                title,
                description,
                status: status.parse()?,
                priority: priority.parse()?,
                due_date: due.as_deref().map(parse_due_date).transpose()?,
            };
            let task = sync.create_task(fields).await?;
            drain_notices(&mut notices, output.quiet || output.json);

            if output.json {
                print_json(&task)?;
            } else if !output.quiet {
                print_task(&task);
            }
        },

        TaskCommands::List {
            search,
            filter,
            sort,
        } => {
            let query = build_query(search, &filter, &sort)?;
            let tasks = sync.view(&query);
            drain_notices(&mut notices, output.json);

            if output.json {
                print_json(&tasks)?;
            } else {
                print_task_list(&tasks, sync.tasks().len());
            }
        },

        TaskCommands::Edit {
            id,
            title,
            description,
            clear_description,
            status,
            priority,
            due,
            clear_due,
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                status: status.as_deref().map(str::parse).transpose()?,
                priority: priority.as_deref().map(str::parse).transpose()?,
                due_date: if clear_due {
                    Some(None)
                } else {
                    due.as_deref().map(parse_due_date).transpose()?.map(Some)
                },
            };
            if patch.is_empty() {
                return Err(TaskError::InvalidInput(
                    "Nothing to change. Pass at least one field to edit".to_string(),
                ));
            }

            let task = sync.update_task(&id, patch).await?;
            drain_notices(&mut notices, output.quiet || output.json);

            if output.json {
                print_json(&task)?;
            } else if !output.quiet {
                print_task(&task);
            }
        },

        TaskCommands::Delete { id, yes } => {
            let task = sync
                .tasks()
                .into_iter()
                .find(|t| t.id == id)
                .ok_or_else(|| TaskError::TaskNotFound(id.clone()))?;

            if !confirm(&format!("Delete '{}'?", task.title), yes)? {
                if !output.quiet {
                    println!("Cancelled");
                }
                return Ok(());
            }

            sync.delete_task(&id).await?;
            drain_notices(&mut notices, output.quiet || output.json);

            if output.json {
                print_json(&json!({
                    "deleted": true,
                    "task_id": id,
                    "title": task.title,
                }))?;
            } else if !output.quiet {
                println!("Deleted '{}'", task.title);
            }
        },

        TaskCommands::Cycle { id } => {
            let task = sync.cycle_status(&id).await?;
            drain_notices(&mut notices, output.quiet || output.json);

            if output.json {
                print_json(&task)?;
            } else if !output.quiet {
                print_task(&task);
            }
        },

        TaskCommands::Share { id, email } => {
            let grant = sync.share_task(&id, &email).await?;
            drain_notices(&mut notices, output.quiet || output.json);

            if output.json {
                print_json(&grant)?;
            }
        },

        TaskCommands::Stats => {
            let stats = sync.stats();
            drain_notices(&mut notices, output.json);

            if output.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        },
    }

    Ok(())
}
