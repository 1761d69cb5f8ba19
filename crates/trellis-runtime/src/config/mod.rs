//! Configuration loading for the process entry point.
//!
//! Files and environment variables are merged into a [`TrellisConfig`],
//! whose sections replace the seeded settings namespaces through
//! [`ConfigPackage`](crate::ConfigPackage).

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, ENV_PREFIX, PROFILE_VAR, Profile};
pub use schema::{LogFormat, LogLevel, LoggingConfig, SpanEventConfig, TrellisConfig};
