//! Trellis Runtime - process entry point for Trellis applications.
//!
//! This crate provides:
//! - Capture of argv and gateway variables (`capture_environment`)
//! - Layered configuration loading with figment (`ConfigLoader`)
//! - Subscriber setup (`LoggingBuilder`)
//! - The `Runtime` that composes, dispatches and writes the response
//!
//! ```rust,ignore
//! use trellis_runtime::Runtime;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> trellis_runtime::RuntimeResult<()> {
//!     Runtime::new().package(Blog).execute().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod package;
pub mod process;
pub mod runtime;

pub use config::{
    ConfigLoader, LogFormat, LogLevel, LoggingConfig, Profile, SpanEventConfig, TrellisConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use package::ConfigPackage;
pub use process::{capture_environment, environment_from};
pub use runtime::{Runtime, write_response};

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;
