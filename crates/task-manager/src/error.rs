//! Error types for the task manager
//!
//! Provides structured error handling for task-processing operations.

use thiserror::Error;

/// Task manager error types
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Trigger-lock (Redis) connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Task references rows that no longer exist
    #[error("Stale task: {0}")]
    StaleTask(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Check if this error is retryable
    ///
    /// Transient errors (lock contention, connection hiccups) are retryable
    /// on the next poll tick. Permanent errors (bad config) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Redis(_) | WorkerError::Database(_))
    }

    /// Create an invalid config error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        WorkerError::InvalidConfig(details.into())
    }

    /// Create a stale-task error
    pub fn stale_task(details: impl Into<String>) -> Self {
        WorkerError::StaleTask(details.into())
    }

    #[allow(dead_code)]
    pub fn internal(details: impl Into<String>) -> Self {
        WorkerError::Internal(details.into())
    }
}

/// Convenience result type for task manager operations
pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(!WorkerError::invalid_config("missing field").is_retryable());
        assert!(!WorkerError::stale_task("taskid 5 has no acknowledge").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = WorkerError::stale_task("taskid 5 has no acknowledge");
        assert_eq!(err.to_string(), "Stale task: taskid 5 has no acknowledge");
    }
}
