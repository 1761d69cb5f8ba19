//! Baseline configuration namespaces seeded by the built-in framework package.
//!
//! | name | type | contents |
//! |------|------|----------|
//! | `framework` | [`FrameworkConfig`] | debug flag, log destination, timezone, trusted proxies |
//! | `session` | [`SessionConfig`] | base64 signing key, idle expiry |
//! | `template` | [`TemplateConfig`] | search paths, cache directory, site metadata |
//!
//! All three deserialize with every field optional, so partial config files
//! and environment overrides layer on top of the defaults.

mod framework;
mod session;
mod template;

pub use framework::FrameworkConfig;
pub use session::SessionConfig;
pub use template::{MenuEntry, TemplateConfig};

use std::any::Any;

/// A configuration type that lives under a fixed settings namespace.
pub trait ConfigNamespace: Any + Send + Sync + Clone {
    /// Namespace key in the [`Settings`](crate::Settings) registry.
    const NAME: &'static str;
}

impl ConfigNamespace for FrameworkConfig {
    const NAME: &'static str = "framework";
}

impl ConfigNamespace for SessionConfig {
    const NAME: &'static str = "session";
}

impl ConfigNamespace for TemplateConfig {
    const NAME: &'static str = "template";
}
