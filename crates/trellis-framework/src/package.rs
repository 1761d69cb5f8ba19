//! The package contract.
//!
//! A package contributes to composition through up to five hooks, each
//! called at a fixed point by [`Framework`].  Every hook defaults to a
//! no-op, so a package implements only what it needs.
//!
//! | phase | order | receives |
//! |-------|-------|----------|
//! | `definitions` | forward | the mutable [`DependencyRegistry`] |
//! | `events` | forward | [`EventsContext`] |
//! | `settings` | forward | [`SettingsContext`] |
//! | `middleware` | reverse | the [`Framework`] |
//! | `routes` | forward | the [`Framework`] |
//!
//! Middleware runs in reverse so the first package's layers are added last
//! and therefore wrap everything later packages add.
//!
//! ```rust,ignore
//! struct Blog;
//!
//! impl Package for Blog {
//!     fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
//!         ctx.settings().update_section(|t: &mut TemplateConfig| t.paths.push("blog".into()))?;
//!         Ok(())
//!     }
//!
//!     fn routes(&self, framework: &Framework) -> FrameworkResult<()> {
//!         framework.app().get("/posts/{slug}", show_post);
//!         Ok(())
//!     }
//! }
//! ```

use std::any::type_name;
use std::sync::Arc;

use trellis_core::{Container, DependencyRegistry, EventDispatcher, RunMode, Settings};

use crate::error::FrameworkResult;
use crate::framework::Framework;

/// A unit of extension contributing optional composition hooks.
pub trait Package {
    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Registers dependency rules.  A later package's rule for the same key
    /// replaces an earlier one.
    fn definitions(&self, _registry: &mut DependencyRegistry) -> FrameworkResult<()> {
        Ok(())
    }

    /// Subscribes event listeners.
    fn events(&self, _ctx: &EventsContext<'_>) -> FrameworkResult<()> {
        Ok(())
    }

    /// Registers or mutates settings namespaces.
    fn settings(&self, _ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        Ok(())
    }

    /// Adds middleware to the application.
    fn middleware(&self, _framework: &Framework) -> FrameworkResult<()> {
        Ok(())
    }

    /// Adds routes to the application.
    fn routes(&self, _framework: &Framework) -> FrameworkResult<()> {
        Ok(())
    }
}

impl<P: Package + ?Sized> Package for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
        (**self).definitions(registry)
    }

    fn events(&self, ctx: &EventsContext<'_>) -> FrameworkResult<()> {
        (**self).events(ctx)
    }

    fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        (**self).settings(ctx)
    }

    fn middleware(&self, framework: &Framework) -> FrameworkResult<()> {
        (**self).middleware(framework)
    }

    fn routes(&self, framework: &Framework) -> FrameworkResult<()> {
        (**self).routes(framework)
    }
}

/// What the events phase can reach.
pub struct EventsContext<'a> {
    pub(crate) container: &'a Arc<Container>,
    pub(crate) dispatcher: &'a EventDispatcher,
    pub(crate) mode: RunMode,
}

impl EventsContext<'_> {
    pub fn container(&self) -> &Arc<Container> {
        self.container
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        self.dispatcher
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }
}

/// What the settings phase can reach.
pub struct SettingsContext<'a> {
    pub(crate) container: &'a Arc<Container>,
    pub(crate) settings: &'a Settings,
    pub(crate) mode: RunMode,
}

impl SettingsContext<'_> {
    pub fn container(&self) -> &Arc<Container> {
        self.container
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }
}
