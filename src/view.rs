//! Derived task views: text search, one categorical filter, one sort key.
//!
//! Everything here is pure. The input slice is never modified and "today"
//! is passed in, so results are reproducible.

use crate::db::models::{Priority, Task, TaskStatus};
use crate::error::{Result, TaskError};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    DueToday,
    Overdue,
    HighPriority,
    Status(TaskStatus),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::DueToday => task.due_date.is_some_and(|due| due == today),
            TaskFilter::Overdue => task.due_date.is_some_and(|due| due < today),
            TaskFilter::HighPriority => task.priority == Priority::High,
            TaskFilter::Status(status) => task.status == *status,
        }
    }
}

impl FromStr for TaskFilter {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "due_today" => Ok(TaskFilter::DueToday),
            "overdue" => Ok(TaskFilter::Overdue),
            "high_priority" => Ok(TaskFilter::HighPriority),
            other => other.parse::<TaskStatus>().map(TaskFilter::Status).map_err(|_| {
                TaskError::InvalidInput(format!(
                    "Invalid filter '{}'. Valid values: all, due_today, overdue, high_priority, todo, in_progress, done",
                    s
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first
    #[default]
    CreatedAt,
    /// Earliest due first, undated last
    DueDate,
    /// high > medium > low
    Priority,
    /// Lexical order of the status name
    Status,
}

impl FromStr for SortKey {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "created_at" => Ok(SortKey::CreatedAt),
            "due_date" => Ok(SortKey::DueDate),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            _ => Err(TaskError::InvalidInput(format!(
                "Invalid sort key '{}'. Valid values: created_at, due_date, priority, status",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub search: String,
    pub filter: TaskFilter,
    pub sort: SortKey,
}

fn matches_search(task: &Task, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_ref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

fn primary_order(sort: SortKey, a: &Task, b: &Task) -> Ordering {
    match sort {
        SortKey::CreatedAt => b.created_at.cmp(&a.created_at),
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Priority => b.priority.rank().cmp(&a.priority.rank()),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

/// Total order: the sort key, then newest first, then id.
fn compare(sort: SortKey, a: &Task, b: &Task) -> Ordering {
    primary_order(sort, a, b)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn apply_view(tasks: &[Task], query: &ViewQuery, today: NaiveDate) -> Vec<Task> {
    let needle = query.search.trim().to_lowercase();

    let mut view: Vec<Task> = tasks
        .iter()
        .filter(|task| matches_search(task, &needle))
        .filter(|task| query.filter.matches(task, today))
        .cloned()
        .collect();

    view.sort_by(|a, b| compare(query.sort, a, b));
    view
}

/// [`apply_view`] against today's local calendar date.
pub fn apply_view_now(tasks: &[Task], query: &ViewQuery) -> Vec<Task> {
    apply_view(tasks, query, chrono::Local::now().date_naive())
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub overdue: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], today: NaiveDate) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Done => stats.done += 1,
            }
            if TaskFilter::Overdue.matches(task, today) {
                stats.overdue += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            owner_id: "owner".to_string(),
        }
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    fn query(filter: TaskFilter, sort: SortKey) -> ViewQuery {
        ViewQuery {
            search: String::new(),
            filter,
            sort,
        }
    }

    #[test]
    fn test_today_overdue_and_undated() {
        let mut a = task("1", "A");
        a.due_date = Some(today());
        let mut b = task("2", "B");
        b.due_date = Some(today() - Duration::days(1));
        let c = task("3", "C");
        let tasks = vec![a, b, c];

        let overdue = apply_view(&tasks, &query(TaskFilter::Overdue, SortKey::CreatedAt), today());
        assert_eq!(titles(&overdue), vec!["B"]);

        let due_today =
            apply_view(&tasks, &query(TaskFilter::DueToday, SortKey::CreatedAt), today());
        assert_eq!(titles(&due_today), vec!["A"]);
    }

    #[test]
    fn test_search_title_or_description_case_insensitive() {
        let mut a = task("1", "Write REPORT");
        a.description = Some("quarterly".into());
        let mut b = task("2", "Email");
        b.description = Some("attach the Report".into());
        let c = task("3", "Groceries");
        let tasks = vec![a, b, c];

        let view = apply_view(
            &tasks,
            &ViewQuery {
                search: "report".into(),
                ..Default::default()
            },
            today(),
        );
        assert_eq!(view.len(), 2);
        assert!(!titles(&view).contains(&"Groceries"));
    }

    #[test]
    fn test_default_sort_newest_first() {
        let mut old = task("1", "old");
        old.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let new = task("2", "new");

        let view = apply_view(&[old, new], &ViewQuery::default(), today());
        assert_eq!(titles(&view), vec!["new", "old"]);
    }

    #[test]
    fn test_status_sort_is_lexical() {
        let mut a = task("1", "todo");
        a.status = TaskStatus::Todo;
        let mut b = task("2", "done");
        b.status = TaskStatus::Done;
        let mut c = task("3", "in_progress");
        c.status = TaskStatus::InProgress;

        let view = apply_view(&[a, b, c], &query(TaskFilter::All, SortKey::Status), today());
        assert_eq!(titles(&view), vec!["done", "in_progress", "todo"]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let tasks = vec![task("b", "second"), task("a", "first")];
        let view = apply_view(&tasks, &query(TaskFilter::All, SortKey::Priority), today());
        assert_eq!(titles(&view), vec!["first", "second"]);
    }

    #[test]
    fn test_input_untouched() {
        let tasks = vec![task("2", "b"), task("1", "a")];
        let before = tasks.clone();
        let _ = apply_view(&tasks, &query(TaskFilter::All, SortKey::Priority), today());
        assert_eq!(tasks, before);
    }

    #[test]
    fn test_parse_filter_and_sort() {
        assert_eq!("due_today".parse::<TaskFilter>().unwrap(), TaskFilter::DueToday);
        assert_eq!(
            "in_progress".parse::<TaskFilter>().unwrap(),
            TaskFilter::Status(TaskStatus::InProgress)
        );
        assert!("someday".parse::<TaskFilter>().is_err());
        assert_eq!("due_date".parse::<SortKey>().unwrap(), SortKey::DueDate);
        assert!("title".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_stats() {
        let mut a = task("1", "a");
        a.status = TaskStatus::Done;
        let mut b = task("2", "b");
        b.status = TaskStatus::InProgress;
        b.due_date = Some(today() - Duration::days(3));
        let c = task("3", "c");

        let stats = TaskStats::from_tasks(&[a, b, c], today());
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                todo: 1,
                in_progress: 1,
                done: 1,
                overdue: 1,
            }
        );
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Todo),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Done)
        ]
    }

    fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High)]
    }

    fn arb_task() -> impl Strategy<Value = Task> {
        (
            "[a-z]{1,8}",
            arb_status(),
            arb_priority(),
            proptest::option::of(-10i64..10),
            0i64..100_000,
        )
            .prop_map(|(id, status, priority, due_offset, created)| Task {
                id: id.clone(),
                title: id,
                description: None,
                status,
                priority,
                due_date: due_offset.map(|d| today() + Duration::days(d)),
                created_at: DateTime::from_timestamp(1_700_000_000 + created, 0).unwrap(),
                updated_at: None,
                owner_id: "owner".to_string(),
            })
    }

    fn arb_filter() -> impl Strategy<Value = TaskFilter> {
        prop_oneof![
            Just(TaskFilter::DueToday),
            Just(TaskFilter::Overdue),
            Just(TaskFilter::HighPriority),
            arb_status().prop_map(TaskFilter::Status),
        ]
    }

    proptest! {
        #[test]
        fn prop_filter_is_exact_partition(
            tasks in proptest::collection::vec(arb_task(), 0..30),
            filter in arb_filter(),
        ) {
            let view = apply_view(&tasks, &query(filter, SortKey::CreatedAt), today());
            prop_assert!(view.iter().all(|t| filter.matches(t, today())));
            let expected = tasks.iter().filter(|t| filter.matches(t, today())).count();
            prop_assert_eq!(view.len(), expected);
        }

        #[test]
        fn prop_due_date_sort_undated_last(tasks in proptest::collection::vec(arb_task(), 0..30)) {
            let view = apply_view(&tasks, &query(TaskFilter::All, SortKey::DueDate), today());
            let first_undated = view.iter().position(|t| t.due_date.is_none()).unwrap_or(view.len());
            prop_assert!(view[first_undated..].iter().all(|t| t.due_date.is_none()));
            let dated: Vec<NaiveDate> = view[..first_undated].iter().filter_map(|t| t.due_date).collect();
            prop_assert!(dated.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn prop_priority_sort_descending(tasks in proptest::collection::vec(arb_task(), 0..30)) {
            let view = apply_view(&tasks, &query(TaskFilter::All, SortKey::Priority), today());
            prop_assert!(view.windows(2).all(|w| w[0].priority.rank() >= w[1].priority.rank()));
        }
    }
}
