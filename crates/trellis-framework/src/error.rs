//! Error types for the Trellis framework layer.

use thiserror::Error;
use trellis_core::{BoxError, CommandParseError, ConfigError, ResolutionError};

/// Errors raised while composing or running a [`Framework`](crate::Framework).
///
/// Construction is all-or-nothing: any of these aborts it and no partially
/// composed framework is returned.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A settings value failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The container could not produce a required service.
    #[error(transparent)]
    Dependency(#[from] ResolutionError),

    /// The command-line grammar rejected `argv` during CLI emulation.
    #[error(transparent)]
    CommandParse(#[from] CommandParseError),

    /// Parsed arguments could not be encoded as a query string.
    #[error("failed to encode command-line arguments: {0}")]
    QueryEncoding(#[from] serde_urlencoded::ser::Error),

    /// An error escaped the middleware pipeline.
    ///
    /// Only reachable when no error layer is installed; the built-in package
    /// installs one that renders every error into a response.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
}

/// Result type for framework operations and package hooks.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
