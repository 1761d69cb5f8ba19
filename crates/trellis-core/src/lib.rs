//! # Trellis Core
//!
//! Leaf building blocks shared by every Trellis crate.
//!
//! This layer provides:
//! - The error taxonomy ([`ResolutionError`], [`ConfigError`], [`CommandParseError`])
//! - A dependency registry that is sealed once into an immutable [`Container`]
//! - The [`Settings`] registry and the three baseline configuration namespaces
//! - The [`Environment`] descriptor and [`RunMode`]
//! - A typed [`EventDispatcher`]
//!
//! Nothing here knows about HTTP; request and response types live in
//! `trellis-framework`.

pub mod config;
pub mod container;
pub mod environment;
pub mod error;
pub mod events;
pub mod settings;

pub use config::{ConfigNamespace, FrameworkConfig, SessionConfig, TemplateConfig};
pub use container::{Container, DependencyRegistry};
pub use environment::{Environment, RunMode, SharedEnvironment};
pub use error::{
    BoxError, CommandParseError, ConfigError, ConfigResult, ResolutionError, ResolutionResult,
};
pub use events::{Event, EventDispatcher};
pub use settings::Settings;
