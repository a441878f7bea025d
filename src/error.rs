use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("No account found for '{0}'. They may need to sign up first.")]
    RecipientNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for '{0}'")]
    EmailTaken(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl TaskError {
    pub fn to_error_code(&self) -> &'static str {
        match self {
            TaskError::AuthRequired => "AUTH_REQUIRED",
            TaskError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            TaskError::Store(_) | TaskError::Database(_) => "STORE_ERROR",
            TaskError::ValidationError(_) => "VALIDATION_ERROR",
            TaskError::TaskNotFound(_) => "TASK_NOT_FOUND",
            TaskError::InvalidCredentials => "INVALID_CREDENTIALS",
            TaskError::EmailTaken(_) => "EMAIL_TAKEN",
            TaskError::InvalidInput(_) => "INVALID_INPUT",
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.to_error_code().to_string(),
        }
    }

    /// Whether the failure came from the store rather than from the caller.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, TaskError::Store(_) | TaskError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
