//! Error types for the Kiln training core

use thiserror::Error;

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

/// Main error type for the Kiln training core
#[derive(Error, Debug)]
pub enum KilnError {
    /// Invalid backend selection or inaccessible output path. Fatal, never retried.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O failure on open/save/delete, or an operation on a closed handle.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Lookup of a name with no persisted content behind it.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fold count out of range, or an illegal metrics aggregation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation invoked in a state that does not permit it. Programmer error.
    #[error("Lifecycle error: {0}")]
    LifecycleError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for KilnError {
    fn from(err: bincode::Error) -> Self {
        KilnError::SerializationError(err.to_string())
    }
}

impl From<polars::error::PolarsError> for KilnError {
    fn from(err: polars::error::PolarsError) -> Self {
        KilnError::DataError(err.to_string())
    }
}
