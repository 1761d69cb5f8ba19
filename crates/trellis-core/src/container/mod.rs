//! Dependency definitions and the container built from them.
//!
//! # Lifecycle
//!
//! ```text
//! DependencyRegistry::new() ──► instance / singleton / factory / alias (any order, last wins)
//!                 build()   ──► Container (immutable, resolve only)
//! ```
//!
//! Keys are Rust types.  A key may be a concrete type or a trait object
//! (`dyn Trait`); the container always hands out `Arc<T>`.
//!
//! ```rust,ignore
//! let mut registry = DependencyRegistry::new();
//! registry.singleton(|_| Ok(Greeter::new("hello")));
//! registry.alias::<dyn Greet, Greeter>(|g| g);
//!
//! let container = registry.build();
//! let greet: Arc<dyn Greet> = container.resolve::<dyn Greet>()?;
//! ```

mod locator;
mod registry;

pub use locator::Container;
pub use registry::DependencyRegistry;

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::BoxError;

/// Type-erased service value.  The inner `dyn Any` is always an `Arc<T>`
/// for the key type `T`, so trait-object keys round-trip through `Any`.
pub(crate) type ServiceArc = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn = Box<dyn Fn(&Container) -> Result<ServiceArc, BoxError> + Send + Sync>;

pub(crate) type CastFn = Box<dyn Fn(ServiceArc) -> Option<ServiceArc> + Send + Sync>;

/// How the container produces the value for one key.
pub(crate) enum Rule {
    /// A pre-built value.
    Instance(ServiceArc),
    /// Factory invoked on first resolve, result cached.
    Singleton(FactoryFn),
    /// Factory invoked on every resolve.
    Factory(FactoryFn),
    /// Resolve `target` and convert it with `cast`.
    Alias {
        target: TypeId,
        target_name: &'static str,
        cast: CastFn,
    },
}

impl Rule {
    fn kind(&self) -> &'static str {
        match self {
            Self::Instance(_) => "instance",
            Self::Singleton(_) => "singleton",
            Self::Factory(_) => "factory",
            Self::Alias { .. } => "alias",
        }
    }
}

pub(crate) struct Definition {
    pub(crate) name: &'static str,
    pub(crate) rule: Rule,
}
