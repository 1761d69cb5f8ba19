//! # Trellis
//!
//! Compose a request-handling application from independently pluggable
//! packages and serve one request per process, either from a web server
//! (gateway mode) or from a command line.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌─────────────────────────────┐
//! │ Runtime  │──▶│ Framework (composition)      │──▶│ Application                 │
//! │ argv,    │   │ definitions → events →       │   │ error layer → span → user   │
//! │ env vars,│   │ settings → CLI emulation →   │   │ middleware → router → route │
//! │ config   │   │ proxy → base path → mw → rts │   └─────────────────────────────┘
//! └──────────┘   └──────────────────────────────┘
//! ```
//!
//! - **Packages** contribute definitions, listeners, settings, middleware and routes
//! - **Framework** runs the phases in a fixed order and turns `argv` into a request
//! - **Application** is a tower service stack ending in the router
//! - **Runtime** loads configuration, sets up logging and writes the response
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! struct Hello;
//!
//! impl Package for Hello {
//!     fn routes(&self, framework: &Framework) -> FrameworkResult<()> {
//!         framework.app().get("/hello", |_req: Request| async { "Hello, world" });
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> RuntimeResult<()> {
//!     Runtime::new().package(Hello).execute().await
//! }
//! ```
//!
//! Run as `hello` from a shell, or behind a web server at `/hello`.
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log lines
//! - `testing`: the `TestPackage` fixture

pub use trellis_core as core;
pub use trellis_framework as framework;
pub use trellis_runtime as runtime;

/// Commonly used types.
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    // Entry point
    pub use trellis_runtime::{ConfigLoader, Runtime, RuntimeError, RuntimeResult};

    // Composition
    pub use trellis_core::{
        BoxError, Container, DependencyRegistry, Environment, Event, EventDispatcher, RunMode,
        Settings,
    };
    pub use trellis_framework::{
        EventsContext, Framework, FrameworkError, FrameworkResult, Package, SettingsContext,
    };

    // Settings namespaces
    pub use trellis_core::{ConfigNamespace, FrameworkConfig, SessionConfig, TemplateConfig};

    // Requests and handlers
    pub use trellis_framework::http::{Method, StatusCode};
    pub use trellis_framework::{
        Application, IntoResponse, Next, Request, Response, RouteParams, from_fn,
    };

    // Command line
    pub use trellis_framework::{CommandArgs, CommandLayer, CommandLine, ParsedArgs};

    // Lifecycle events
    pub use trellis_framework::{Booted, RequestHandled};
}
