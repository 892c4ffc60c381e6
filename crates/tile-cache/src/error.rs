//! Error types for the tile cache.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or persisting cache tiles.
#[derive(Error, Debug)]
pub enum TileCacheError {
    /// Reading or writing a tile file failed.
    #[error("tile I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tile file exists but does not parse as a matrix of nullable numbers.
    #[error("corrupt tile {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A tile file parsed but has the wrong dimensions.
    #[error("tile {key} has shape {rows}x{cols}, expected {span}x{span}")]
    Shape {
        key: String,
        rows: usize,
        cols: usize,
        span: usize,
    },

    /// Tile span must be at least 1.
    #[error("invalid tile span: {0}")]
    InvalidSpan(usize),

    /// A flush was stopped by its caller before every tile was written.
    #[error("flush interrupted after {tiles_written} tiles")]
    Interrupted { tiles_written: usize },

    /// A blocking write task was cancelled or panicked.
    #[error("tile write task failed: {0}")]
    Join(String),
}

impl TileCacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for tile cache operations.
pub type Result<T> = std::result::Result<T, TileCacheError>;
