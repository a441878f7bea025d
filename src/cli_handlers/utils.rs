//! Utility functions for CLI handlers
//!
//! Parsing of free-form arguments, prompts, and the text renderings shared
//! by several commands.

use crate::db::models::{SharedTask, Task, TaskStatus};
use crate::error::{Result, TaskError};
use crate::notifications::{Notice, NoticeLevel};
use crate::view::{TaskStats, ViewQuery};
use chrono::NaiveDate;
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use serde::Serialize;
use std::io::IsTerminal;
use tokio::sync::mpsc;

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_due_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        TaskError::InvalidInput(format!(
            "Invalid due date '{}'. Expected YYYY-MM-DD",
            value
        ))
    })
}

pub fn build_query(search: Option<String>, filter: &str, sort: &str) -> Result<ViewQuery> {
    Ok(ViewQuery {
        search: search.unwrap_or_default(),
        filter: filter.parse()?,
        sort: sort.parse()?,
    })
}

/// Use the given password or prompt for one on a terminal.
pub fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(TaskError::InvalidInput(
            "Password is required (pass --password when not on a terminal)".to_string(),
        ));
    }

    let theme = ColorfulTheme::default();
    let mut prompt = Password::with_theme(&theme);
    prompt = prompt.with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    prompt
        .interact()
        .map_err(|e| TaskError::InvalidInput(format!("Password prompt cancelled: {}", e)))
}

/// Ask before a destructive action. `assume_yes` skips the prompt.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(TaskError::InvalidInput(
            "Confirmation required (pass --yes when not on a terminal)".to_string(),
        ));
    }

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| TaskError::InvalidInput(format!("Confirmation cancelled: {}", e)))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Get a status badge icon for task status
pub fn get_status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => "✓",
        TaskStatus::InProgress => "●",
        TaskStatus::Todo => "○",
    }
}

pub fn format_task_line(task: &Task) -> String {
    let due = task
        .due_date
        .map(|d| format!(" (due {})", d))
        .unwrap_or_default();
    format!(
        "{} {} {} [{}]{}",
        get_status_badge(task.status),
        task.id,
        task.title,
        task.priority,
        due
    )
}

pub fn print_task(task: &Task) {
    println!("{}", format_task_line(task));
    if let Some(description) = &task.description {
        for line in description.lines() {
            println!("    {}", line);
        }
    }
}

pub fn print_task_list(tasks: &[Task], total: usize) {
    println!("Tasks: {} shown of {}", tasks.len(), total);
    if tasks.is_empty() {
        return;
    }
    println!();
    for task in tasks {
        println!("  {}", format_task_line(task));
    }
}

pub fn print_shared_list(grants: &[SharedTask]) {
    println!("Shared with you: {}", grants.len());
    if grants.is_empty() {
        return;
    }
    println!();
    for grant in grants {
        match &grant.task {
            Some(task) => println!("  {}  (grant {})", format_task_line(task), grant.id),
            None => println!("  ? {} (task no longer visible, grant {})", grant.task_id, grant.id),
        }
    }
}

pub fn print_stats(stats: &TaskStats) {
    println!("Total:       {}", stats.total);
    println!("Todo:        {}", stats.todo);
    println!("In progress: {}", stats.in_progress);
    println!("Done:        {}", stats.done);
    println!("Overdue:     {}", stats.overdue);
}

/// Print whatever notices have queued up so far, on stderr.
pub fn drain_notices(rx: &mut mpsc::UnboundedReceiver<Notice>, quiet: bool) {
    while let Ok(notice) = rx.try_recv() {
        if quiet && notice.level == NoticeLevel::Success {
            continue;
        }
        match notice.level {
            NoticeLevel::Success => eprintln!("✓ {}", notice.description),
            NoticeLevel::Error => eprintln!("✗ {}: {}", notice.title, notice.description),
        }
    }
}
