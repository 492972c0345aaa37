//! Centralized error types for KMIndex.

use thiserror::Error;

/// Main error type for KMIndex operations.
#[derive(Error, Debug)]
pub enum KmError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Vector length mismatch for '{id}': query has {expected} dimensions, stored vector has {found}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module '{module_id}' is missing field '{field}'")]
    MissingField { module_id: String, field: String },

    #[error("Stored record at {path} belongs to '{found}', expected '{expected}'")]
    RecordConflict {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for KMIndex operations.
pub type KmResult<T> = Result<T, KmError>;

impl KmError {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an embedding error.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than I/O or data.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::DimensionMismatch { .. })
    }
}
