//! Common Error Types for the EcoTrace Backend
//!
//! Root error type used by the binary and startup code.

use thiserror::Error;

use crate::storage::StorageError;

/// Root error type for the EcoTrace backend
#[derive(Debug, Error)]
pub enum EcoTraceError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Seed file errors
    #[error("seed error: {0}")]
    Seed(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EcoTraceError {
    /// Create a seed error
    pub fn seed(msg: impl Into<String>) -> Self {
        Self::Seed(msg.into())
    }

    /// Get error code for logs and exit reports
    pub fn error_code(&self) -> &'static str {
        match self {
            EcoTraceError::Config(_) => "CONFIG_ERROR",
            EcoTraceError::Logging(_) => "LOGGING_ERROR",
            EcoTraceError::Storage(_) => "STORAGE_ERROR",
            EcoTraceError::Seed(_) => "SEED_ERROR",
            EcoTraceError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using EcoTraceError
pub type Result<T> = std::result::Result<T, EcoTraceError>;
