//! Error types shared across the Trellis crates.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed, thread-safe error used at service boundaries.
///
/// Identical to `tower::BoxError`, so errors flow between container factories
/// and tower services without conversion.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The container could not produce a required service.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No rule was registered for the requested key.
    #[error("no definition registered for '{service}'")]
    NotFound {
        /// Type name of the requested service.
        service: &'static str,
    },

    /// A rule exists but produced a value of another type.
    #[error("definition for '{service}' produced a value of an unexpected type")]
    TypeMismatch { service: &'static str },

    /// Resolution re-entered a key that is still being constructed.
    #[error("circular dependency detected: {chain}")]
    Circular { chain: String },

    /// The factory for the service returned an error.
    #[error("factory for '{service}' failed: {source}")]
    Factory {
        service: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ResolutionError {
    /// Returns the type name of the service the error is about, if any.
    pub fn service(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { service }
            | Self::TypeMismatch { service }
            | Self::Factory { service, .. } => Some(service),
            Self::Circular { .. } => None,
        }
    }
}

/// Result type for container lookups.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// A settings value failed validation or could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// Missing required field.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// No settings namespace registered under the given name.
    #[error("Settings namespace '{0}' is not registered")]
    MissingNamespace(String),

    /// The namespace holds a value of another concrete type.
    #[error("Settings namespace '{namespace}' does not hold a {expected}")]
    NamespaceType {
        namespace: String,
        expected: &'static str,
    },

    /// The configured timezone is not a known IANA identifier.
    #[error("The timezone \"{0}\" is not valid")]
    InvalidTimezone(String),

    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration sources could not be merged or extracted.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The command-line grammar rejected the supplied arguments.
///
/// Carries the parser message and the rendered help text so the caller can
/// print both instead of aborting the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandParseError {
    message: String,
    help: String,
}

impl CommandParseError {
    pub fn new(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            help: help.into(),
        }
    }

    /// The parser's error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Usage text for the grammar that rejected the arguments.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Message, a blank line, then the help text.
    pub fn render(&self) -> String {
        if self.help.is_empty() {
            return format!("{}\n", self.message.trim_end());
        }
        format!("{}\n\n{}", self.message.trim_end(), self.help)
    }
}
