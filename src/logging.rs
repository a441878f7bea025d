//! Taskshare Logging System
//!
//! Structured logging on `tracing`, with per-mode defaults and optional
//! JSON or file output.

use std::io;
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    /// Enable colored output
    pub color: bool,
    /// Show timestamps
    pub show_timestamps: bool,
    /// Show target/module name
    pub show_target: bool,
    /// Enable JSON format for machine parsing
    pub json_format: bool,
    /// Enable span events for tracing
    pub enable_spans: bool,
    /// Output to file instead of stderr (for long-running watch mode)
    pub file_output: Option<std::path::PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            color: true,
            show_timestamps: false,
            show_target: false,
            json_format: false,
            enable_spans: false,
            file_output: None,
        }
    }
}

impl LoggingConfig {
    /// Create config for different application modes
    pub fn for_mode(mode: ApplicationMode) -> Self {
        match mode {
            ApplicationMode::Watch => Self {
                level: Level::INFO,
                color: false,
                show_timestamps: true,
                show_target: true,
                json_format: false,
                enable_spans: false,
                file_output: None,
            },
            ApplicationMode::Cli => Self::default(),
        }
    }

    /// Create config from CLI arguments
    pub fn from_args(quiet: bool, verbose: u8, json: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::WARN,
            (false, 1) => Level::INFO,
            (false, 2) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };

        Self {
            level,
            color: !quiet && !json && io::stderr().is_terminal(),
            show_timestamps: verbose > 0 || json,
            show_target: verbose > 1,
            json_format: json,
            enable_spans: verbose > 1,
            file_output: None,
        }
    }
}

/// Application modes with different logging requirements
#[derive(Debug, Clone, Copy)]
pub enum ApplicationMode {
    /// One-shot commands - quiet unless something goes wrong
    Cli,
    /// Live view - timestamps, written to a file
    Watch,
}

fn env_filter(level: Level) -> EnvFilter {
    if let Ok(level) = std::env::var("TASKSHARE_LOG_LEVEL") {
        return EnvFilter::new(format!("taskshare={}", level));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("taskshare={}", level)))
}

/// Initialize the logging system
///
/// Console output goes to stderr so command output on stdout stays parseable.
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let registry = Registry::default().with(env_filter(config.level));

    if let Some(log_file) = config.file_output {
        let dir = log_file.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file path")
        })?;
        std::fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::daily(
            dir,
            log_file.file_name().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "Invalid log file name")
            })?,
        );

        if config.json_format {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(config.enable_spans)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender);
            json_layer.with_subscriber(registry).init();
        } else {
            fmt::layer()
                .with_target(config.show_target)
                .with_level(true)
                .with_ansi(false)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_writer(file_appender)
                .with_subscriber(registry)
                .init();
        }
    } else if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(config.enable_spans)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stderr);
        json_layer.with_subscriber(registry).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_level(true)
            .with_ansi(config.color)
            .with_writer(io::stderr);

        if config.show_timestamps {
            fmt_layer
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_subscriber(registry)
                .init();
        } else {
            fmt_layer.without_time().with_subscriber(registry).init();
        }
    }

    Ok(())
}

/// Get log file path for a given application mode
pub fn log_file_path(log_dir: &std::path::Path, mode: ApplicationMode) -> std::path::PathBuf {
    match mode {
        ApplicationMode::Watch => log_dir.join("watch.log"),
        ApplicationMode::Cli => log_dir.join("cli.log"),
    }
}

#[macro_export]
macro_rules! log_task_operation {
    ($operation:expr, $task_id:expr) => {
        tracing::info!(operation = $operation, task_id = $task_id, "Task operation");
    };
    ($operation:expr, $task_id:expr, $details:expr) => {
        tracing::info!(
            operation = $operation,
            task_id = $task_id,
            details = $details,
            "Task operation"
        );
    };
}

#[macro_export]
macro_rules! log_sync_event {
    ($hook:expr, $event:expr) => {
        tracing::debug!(hook = $hook, event = $event, "Sync event");
    };
    ($hook:expr, $event:expr, $details:expr) => {
        tracing::debug!(
            hook = $hook,
            event = $event,
            details = $details,
            "Sync event"
        );
    };
}

/// Utility macro for structured error logging
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Operation failed"
        );
    };
}
