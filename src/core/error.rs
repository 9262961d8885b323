use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Malformed user input, handled locally by re-prompting
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stale or already-consumed resource (used code, taken slot)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// True for errors caused by user input rather than system failure.
    /// These are answered with a specific message instead of the generic
    /// apology.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Conflict(_) | AppError::NotFound(_)
        )
    }
}
