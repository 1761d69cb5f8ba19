//! Runtime error types.

use thiserror::Error;
use trellis_core::ConfigError;
use trellis_framework::FrameworkError;

/// Errors that can occur while running the process entry point.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration files or variables could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Composition or dispatch failed.
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    /// Reading the request or writing the response failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
