//! Error types for datalens.
//!
//! A single error enum covers every failure category in the workspace. The
//! store-facing variants (`InvalidInput`, `Encoding`, `Persistence`,
//! `CorruptState`) are what ingestion and query callers match on.

use thiserror::Error;

/// Unified error type for datalens.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller supplied arguments the store cannot act on
    /// (mismatched sequence lengths, zero `n_results`).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The encoder was unreachable, timed out, or returned malformed output.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A snapshot could not be written or moved into place.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A persisted snapshot is unreadable, malformed, or incompatible.
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
