use clap::{Parser, Subcommand};

const LONG_ABOUT: &str = r#"
Taskshare - personal task lists with read-only sharing

Every command acts as the signed-in account. Sign in once and the session
is remembered in the local database until you sign out.

Workflow:
  taskshare auth signup you@example.com
  taskshare auth signin you@example.com
  taskshare task add "Write release notes" --priority high --due 2025-07-01
  taskshare task list --filter overdue --sort due_date
  taskshare task share <ID> teammate@example.com
  taskshare shared list       ← tasks others shared with you
  taskshare watch             ← live view, refreshed on every change

Environment:
  TASKSHARE_DB_PATH       database file (default ~/.taskshare/taskshare.db)
  TASKSHARE_OAUTH_URL     OAuth authorize endpoint
  TASKSHARE_REDIRECT_URL  OAuth redirect target
  TASKSHARE_POLL_MS       how often watch checks for outside changes
  TASKSHARE_LOG_LEVEL     log filter override
"#;

#[derive(Parser, Clone)]
#[command(name = "taskshare")]
#[command(about = "Collaborative task tracking with read-only sharing and live sync")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output (-q)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results (and logs) as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Account and session management
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Manage your own tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Tasks other people shared with you
    #[command(subcommand)]
    Shared(SharedCommands),

    /// Live view of your tasks, redrawn whenever they change
    ///
    /// Changes made by other taskshare processes against the same database
    /// are picked up too. Press Ctrl-C to stop.
    Watch {
        /// Case-insensitive text to look for in title or description
        #[arg(long)]
        search: Option<String>,

        /// all, due_today, overdue, high_priority, todo, in_progress, done
        #[arg(long, default_value = "all")]
        filter: String,

        /// created_at, due_date, priority, status
        #[arg(long, default_value = "created_at")]
        sort: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum AuthCommands {
    /// Create an account (does not sign in)
    Signup {
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Signin {
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Start a third-party sign-in in the browser
    Oauth {
        /// Provider name, e.g. google or github
        provider: String,

        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// End the current session
    Signout,

    /// Show the signed-in account
    Whoami,
}

#[derive(Subcommand, Clone)]
pub enum TaskCommands {
    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// todo, in_progress or done
        #[arg(long, default_value = "todo")]
        status: String,

        /// low, medium or high
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// List your tasks
    List {
        /// Case-insensitive text to look for in title or description
        #[arg(long)]
        search: Option<String>,

        /// all, due_today, overdue, high_priority, todo, in_progress, done
        #[arg(long, default_value = "all")]
        filter: String,

        /// created_at, due_date, priority, status
        #[arg(long, default_value = "created_at")]
        sort: String,
    },

    /// Change fields of a task
    Edit {
        /// Task ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,

        /// todo, in_progress or done
        #[arg(long)]
        status: Option<String>,

        /// low, medium or high
        #[arg(long)]
        priority: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a task and every grant made for it
    Delete {
        /// Task ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Advance status: todo → in_progress → done → todo
    Cycle {
        /// Task ID
        id: String,
    },

    /// Give another account read access to a task
    Share {
        /// Task ID
        id: String,

        /// Recipient's email address
        email: String,
    },

    /// Counts by status, plus overdue
    Stats,
}

#[derive(Subcommand, Clone)]
pub enum SharedCommands {
    /// List grants made to you
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["taskshare", "task", "list", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Task(TaskCommands::List { .. })));
    }

    #[test]
    fn test_edit_conflicting_flags() {
        let result = Cli::try_parse_from([
            "taskshare",
            "task",
            "edit",
            "abc",
            "--due",
            "2025-01-01",
            "--clear-due",
        ]);
        assert!(result.is_err());
    }
}
