//! Error types for the exposure services.

use thiserror::Error;

/// Result type alias using ExposureError.
pub type ExposureResult<T> = Result<T, ExposureError>;

/// Primary error type for request validation and shared operations.
#[derive(Debug, Error)]
pub enum ExposureError {
    // === Input Errors ===
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ExposureError {
    /// Shorthand for an `InvalidBoundary` error.
    pub fn invalid_boundary(msg: impl Into<String>) -> Self {
        Self::InvalidBoundary(msg.into())
    }

    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ExposureError::InvalidBoundary(_)
            | ExposureError::InvalidParameter { .. }
            | ExposureError::UnknownMetric(_) => 400,

            ExposureError::InternalError(_) => 500,
        }
    }
}

impl From<std::io::Error> for ExposureError {
    fn from(err: std::io::Error) -> Self {
        ExposureError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for ExposureError {
    fn from(err: serde_json::Error) -> Self {
        ExposureError::InternalError(format!("JSON error: {}", err))
    }
}
