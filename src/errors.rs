use std::time::Duration;

use thiserror::Error;

/// Error type shared by the stores, the scheduler and the report pipeline.
#[derive(Debug, Error)]
pub enum ExpenseError {
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("Report queue unavailable: {0}")]
    QueueUnavailable(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("Category resolution failed: {0}")]
    CategoryResolution(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ExpenseError>;

impl ExpenseError {
    /// Dependency failures the caller may retry under its own policy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExpenseError::Storage(_) | ExpenseError::QueueUnavailable(_) | ExpenseError::Timeout { .. }
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ExpenseError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ExpenseError::NotFound(message.into())
    }
}

impl From<std::io::Error> for ExpenseError {
    fn from(err: std::io::Error) -> Self {
        ExpenseError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ExpenseError {
    fn from(err: serde_json::Error) -> Self {
        ExpenseError::Storage(err.to_string())
    }
}
