//! services/alchemist/src/error.rs
//!
//! Defines the primary error type for the application service.

use crate::config::ConfigError;
use book_alchemist_core::{GenerationError, PortError};

/// The primary error type for the `alchemist` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A generation run was refused before it started.
    #[error("Generation Error: {0}")]
    Generation(#[from] GenerationError),

    /// Represents a standard Input/Output error (files, terminal).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<AppError> for PortError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Port(e) => e,
            other => PortError::Storage(other.to_string()),
        }
    }
}
