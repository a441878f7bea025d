// CLI command handlers module
//
// One module per command group:
// auth, task, shared, watch

pub mod auth_commands;
pub mod shared_commands;
pub mod task_commands;
pub mod utils;
pub mod watch_command;

pub use auth_commands::handle_auth_command;
pub use shared_commands::handle_shared_command;
pub use task_commands::handle_task_command;
pub use watch_command::handle_watch_command;

/// Output switches shared by every handler
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}
