//! Runtime configuration, read from `TASKSHARE_*` environment variables over
//! built-in defaults.

use crate::error::{Result, TaskError};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = ".taskshare";
const DB_FILE: &str = "taskshare.db";

const DEFAULT_OAUTH_URL: &str = "http://localhost:54321/auth/v1/authorize";
const DEFAULT_REDIRECT_URL: &str = "http://localhost:3000/";
const DEFAULT_POLL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database backing the task store
    pub db_path: PathBuf,
    /// Authorize endpoint of the OAuth provider
    pub oauth_url: String,
    /// Where the provider sends the browser back to
    pub redirect_url: String,
    /// How often to look for commits made by other processes
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE)
}

impl AppConfig {
    /// Defaults overridden by `TASKSHARE_DB_PATH`, `TASKSHARE_OAUTH_URL`,
    /// `TASKSHARE_REDIRECT_URL` and `TASKSHARE_POLL_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("TASKSHARE_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("TASKSHARE_OAUTH_URL").filter(|v| !v.trim().is_empty()) {
            config.oauth_url = url;
        }
        if let Some(url) = lookup("TASKSHARE_REDIRECT_URL").filter(|v| !v.trim().is_empty()) {
            config.redirect_url = url;
        }
        if let Some(ms) = lookup("TASKSHARE_POLL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                TaskError::InvalidInput(format!("TASKSHARE_POLL_MS must be an integer, got '{}'", ms))
            })?;
            if ms == 0 {
                return Err(TaskError::InvalidInput(
                    "TASKSHARE_POLL_MS must be greater than zero".to_string(),
                ));
            }
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Directory for log files, next to the database.
    pub fn log_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}
