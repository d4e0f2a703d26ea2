//! Error handling for the Resonance worker
//!
//! A single error type covers the task scheduler's synchronous failures
//! (unknown task, bad arguments), the failures a running task can report, and
//! the worker's own configuration and I/O problems.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Scheduling Errors ==========
    /// No task is registered under the requested slug
    #[error("no task found with the slug {0}")]
    NotFound(String),

    /// Unknown argument name, or a required argument is missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two registrations share the same slug
    #[error("a task with the slug {0} is already registered")]
    DuplicateTask(String),

    /// The task manager is shutting down and no longer accepts work
    #[error("task manager is shutting down")]
    ShuttingDown,

    /// The task manager loop is already running
    #[error("task manager is already running")]
    AlreadyRunning,

    // ========== Parameter Errors ==========
    /// A bound parameter could not be converted to the requested type
    #[error("cannot convert parameter '{parameter}' to {target}")]
    Conversion {
        parameter: String,
        target: &'static str,
    },

    // ========== Task Execution Errors ==========
    /// Anticipated, user-facing failure raised by a task body
    #[error("{0}")]
    TaskFailed(String),

    /// The task observed its cancellation signal
    #[error("task cancelled: {0}")]
    Cancelled(String),

    /// The task body panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    // ========== Filesystem Errors ==========
    /// File system access error
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Internal worker error (catch-all for unexpected errors)
    #[error("internal worker error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Build a task failure with a user-facing message
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed(message.into())
    }

    /// Build an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Build a conversion error for the given parameter and target type
    pub fn conversion(parameter: impl Into<String>, target: &'static str) -> Self {
        Self::Conversion {
            parameter: parameter.into(),
            target,
        }
    }

    /// Whether this error was caused by the caller of the scheduling API
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidArgument(_) | Self::Conversion { .. }
        )
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical errors that should alert operators
            Self::Configuration(_) | Self::DuplicateTask(_) => ErrorSeverity::Critical,

            // Unexpected failures
            Self::Panicked(_) | Self::Internal(_) | Self::Filesystem(_) => ErrorSeverity::Error,

            // Anticipated failures
            Self::TaskFailed(_) | Self::Cancelled(_) => ErrorSeverity::Warning,

            _ => ErrorSeverity::Info,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(error = %self, "Critical worker error");
            }
            ErrorSeverity::Error => {
                tracing::error!(error = ?self, "Worker error");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, "Worker warning");
            }
            ErrorSeverity::Info => {
                tracing::info!(error = %self, "Worker info");
            }
        }
    }

    /// HTTP status code for the task-control endpoint
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) | Self::Conversion { .. } => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "TASK_NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::DuplicateTask(_) => "DUPLICATE_TASK",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::Conversion { .. } => "CONVERSION_ERROR",
            Self::TaskFailed(_) => "TASK_FAILED",
            Self::Cancelled(_) => "CANCELLED",
            Self::Panicked(_) => "TASK_PANICKED",
            Self::Filesystem(_) => "FILESYSTEM_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Error body returned by the task-control endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Task endpoint error");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Task endpoint rejected request");
        }

        let body = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ========== Conversion Implementations ==========

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to WorkerError first
        match err.downcast::<WorkerError>() {
            Ok(worker_err) => worker_err,
            Err(err) => Self::Internal(format!("{:#}", err)),
        }
    }
}

impl From<resonance_shared_config::ConfigError> for WorkerError {
    fn from(err: resonance_shared_config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Self::Panicked(message)
        } else {
            Self::Cancelled(err.to_string())
        }
    }
}
