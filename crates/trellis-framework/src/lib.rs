//! # Trellis Framework
//!
//! Composes a request-handling application from pluggable packages and runs
//! it for one request, over HTTP or from a command line.
//!
//! This layer provides:
//! - The [`Package`] contract and the [`Framework`] orchestrator
//! - CLI emulation, proxy trust and base path resolution
//! - The [`Application`] handle: routes behind tower middleware
//! - [`Request`] / [`Response`] and error rendering
//! - Command-line parsing backed by clap
//!
//! ```rust,ignore
//! let framework = Framework::builder()
//!     .package(&Blog)
//!     .environment(environment)
//!     .build()?;
//! let response = framework.run().await?;
//! ```

pub mod application;
pub mod base_path;
pub mod builtin;
pub mod command;
pub mod error;
pub mod error_handler;
pub mod events;
pub mod framework;
pub mod http;
pub mod normalize;
pub mod package;
pub mod proxy;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use application::{Application, Handler, HandlerService, Next, RequestService, from_fn};
pub use builtin::FrameworkPackage;
pub use command::{CommandArgs, CommandError, CommandLayer, CommandLine, ParseOutcome, ParsedArgs};
pub use error::{FrameworkError, FrameworkResult};
pub use error_handler::{
    ErrorHandler, ErrorLayer, ErrorPage, ErrorRenderer, HtmlErrorRenderer, PlainTextErrorRenderer,
};
pub use events::{Booted, RequestHandled};
pub use framework::{Framework, FrameworkBuilder};
pub use http::{HttpError, IntoResponse, Request, Response, RouteParams};
pub use package::{EventsContext, Package, SettingsContext};
pub use session::SessionKey;

#[cfg(any(test, feature = "testing"))]
pub use testing::TestPackage;
