//! Error types for music-dl
//!
//! This module provides the error taxonomy shared by every layer of the library:
//! - Registry errors (unknown task, invalid state transitions) returned synchronously to callers
//! - Per-instance errors (transport, decode) absorbed by the instance resolver
//! - The aggregate "no instance succeeded" error surfaced to the provider layer
//! - The cancellation sentinel used to tell an intentional abort apart from a failure

use crate::types::{TaskId, UserId};
use thiserror::Error;

/// Result type alias for music-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for music-dl
///
/// Each variant carries enough context to be logged without further wrapping.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown task, instance, provider or catalogue entry
    #[error("not found: {0}")]
    NotFound(String),

    /// Unrecognized provider name, download kind or quality
    #[error("validation error: {0}")]
    Validation(String),

    /// Network failure, timeout or non-2xx response from a single endpoint
    #[error("transport error for {url}: {message}")]
    Transport {
        /// The URL that was being fetched
        url: String,
        /// Human-readable failure description
        message: String,
    },

    /// Malformed provider payload
    #[error("decode error ({context}): {message}")]
    Decode {
        /// What was being decoded (e.g. "track manifest")
        context: String,
        /// Human-readable failure description
        message: String,
    },

    /// Intentional abort (user cancel, task removal, shutdown)
    #[error("operation cancelled")]
    Cancelled,

    /// Every registered instance failed, or none is registered
    #[error("no {api} instance succeeded{}", .last.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    NoInstance {
        /// The API whose instances were raced
        api: String,
        /// The last failure observed across the race, if any instance was tried
        last: Option<Box<Error>>,
    },

    /// Task registry error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Instance directory persistence failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// External tool execution failed (ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Constraint violation (e.g., an instance registered twice)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Task registry errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Task not found for this user
    #[error("download {id} not found for user {user}")]
    NotFound {
        /// The user that owns (or would own) the task
        user: UserId,
        /// The task ID that was not found
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} download {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "retry")
        operation: String,
        /// The current state that prevents the operation (e.g., "running")
        current_state: String,
    },

    /// The task's supervisor has already exited and cannot receive signals
    #[error("download {id} is no longer supervised")]
    Terminated {
        /// The task ID whose supervisor is gone
        id: TaskId,
    },
}

impl Error {
    /// Build a transport error for `url`
    pub fn transport(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Build a decode error for `context`
    pub fn decode(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error is the cancellation sentinel
    ///
    /// An aggregate race error whose last failure was a cancellation counts as well,
    /// since that only happens when the caller's scope was torn down mid-race.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::NoInstance { last: Some(last), .. } => last.is_cancelled(),
            _ => false,
        }
    }

    /// Machine-readable code for embedding applications
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Transport { .. } => "transport_error",
            Error::Decode { .. } => "decode_error",
            Error::Cancelled => "cancelled",
            Error::NoInstance { .. } => "no_instance",
            Error::Download(DownloadError::NotFound { .. }) => "download_not_found",
            Error::Download(DownloadError::InvalidState { .. }) => "invalid_state",
            Error::Download(DownloadError::Terminated { .. }) => "terminated",
            Error::Io(_) => "io_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Config { .. } => "config_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::ShuttingDown => "shutting_down",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let message = if e.is_timeout() {
            format!("timed out: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };
        Error::Transport { url, message }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode("json", e)
    }
}
