//! Error types for the grid scheduler.

use std::path::PathBuf;

use exposure_common::ExposureError;
use projection::ProjectionError;
use thiserror::Error;
use tile_cache::TileCacheError;

/// Errors that abort a simulation request.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Malformed or degenerate request input.
    #[error("invalid request: {0}")]
    InvalidInput(#[from] ExposureError),

    /// A boundary vertex could not be projected.
    #[error("invalid boundary: {0}")]
    Projection(#[from] ProjectionError),

    /// A cache tile could not be read or written.
    #[error("cache error: {0}")]
    Cache(#[from] TileCacheError),

    /// The session was cancelled before results were final.
    #[error("session {0} was cancelled")]
    Cancelled(String),

    /// A client-supplied session id is already in use.
    #[error("session {0} is already active")]
    SessionConflict(String),

    /// A client-supplied session id contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// Workspace directory or metadata I/O failed.
    #[error("workspace error on {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The obstruction provider failed.
    #[error("obstruction data unavailable: {0}")]
    Obstructions(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SchedulerError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidInput(_)
                | SchedulerError::Projection(_)
                | SchedulerError::SessionConflict(_)
                | SchedulerError::InvalidSessionId(_)
        )
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SchedulerError::InvalidInput(e) => e.http_status_code(),
            SchedulerError::Projection(_) | SchedulerError::InvalidSessionId(_) => 400,
            SchedulerError::SessionConflict(_) => 409,
            // cancelled requests answer with a null result
            SchedulerError::Cancelled(_) => 200,
            SchedulerError::Cache(_)
            | SchedulerError::Workspace { .. }
            | SchedulerError::Obstructions(_)
            | SchedulerError::Config(_) => 500,
        }
    }
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Failure of one worker task. Logged and dropped, never fatal to a request.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The kernel reported an error.
    #[error("kernel failed: {0}")]
    Failed(String),

    /// The kernel returned no output for the batch.
    #[error("kernel returned no result")]
    Unavailable,

    /// The kernel returned the wrong number of values.
    #[error("kernel returned {got} values for {expected} points")]
    OutputMismatch { expected: usize, got: usize },

    /// The task panicked or its thread was lost.
    #[error("task aborted: {0}")]
    Aborted(String),
}
