use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{CastFn, Container, Definition, FactoryFn, Rule, ServiceArc};
use crate::error::BoxError;

/// Accumulates construction rules until it is sealed into a [`Container`].
///
/// The registry is write-only: there is no way to read a service before
/// [`build`](Self::build) is called.  Registering a key twice replaces the
/// earlier rule, so packages that run later override packages that ran
/// earlier.
#[derive(Default)]
pub struct DependencyRegistry {
    definitions: HashMap<TypeId, Definition>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert<T: ?Sized + 'static>(&mut self, rule: Rule) -> &mut Self {
        let name = type_name::<T>();
        let kind = rule.kind();
        if let Some(previous) = self
            .definitions
            .insert(TypeId::of::<T>(), Definition { name, rule })
        {
            debug!(
                service = name,
                previous = previous.rule.kind(),
                replacement = kind,
                "Definition overridden, last registration wins"
            );
        } else {
            trace!(service = name, kind, "Definition registered");
        }
        self
    }

    /// Registers a pre-built value.
    pub fn instance<T>(&mut self, value: T) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.shared(Arc::new(value))
    }

    /// Registers an already shared value; `T` may be a trait object.
    pub fn shared<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert::<T>(Rule::Instance(Arc::new(value) as ServiceArc))
    }

    /// Registers a factory that runs once, on first resolve.
    pub fn singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.insert::<T>(Rule::Singleton(erase(move |c| factory(c).map(Arc::new))))
    }

    /// Like [`singleton`](Self::singleton) for factories that already return
    /// an `Arc`, which is the only way to produce a trait-object key.
    pub fn singleton_arc<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.insert::<T>(Rule::Singleton(erase(factory)))
    }

    /// Registers a factory that runs on every resolve.
    pub fn factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.insert::<T>(Rule::Factory(erase(move |c| factory(c).map(Arc::new))))
    }

    /// Resolves `T` through the definition of `U`.
    ///
    /// `upcast` is usually the identity closure `|u| u`, which lets the
    /// compiler coerce `Arc<Concrete>` into `Arc<dyn Trait>`.
    pub fn alias<T, U>(&mut self, upcast: fn(Arc<U>) -> Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        U: ?Sized + Send + Sync + 'static,
    {
        let cast: CastFn = Box::new(move |value: ServiceArc| {
            value
                .downcast_ref::<Arc<U>>()
                .map(|inner| Arc::new(upcast(Arc::clone(inner))) as ServiceArc)
        });
        self.insert::<T>(Rule::Alias {
            target: TypeId::of::<U>(),
            target_name: type_name::<U>(),
            cast,
        })
    }

    /// Returns `true` if a rule is registered for `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.definitions.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Seals the registry.  This is irreversible: the container is immutable.
    pub fn build(self) -> Container {
        debug!(definitions = self.definitions.len(), "Building container");
        Container::new(self.definitions)
    }
}

fn erase<T, F>(factory: F) -> FactoryFn
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Container) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
{
    Box::new(move |c| factory(c).map(|value| Arc::new(value) as ServiceArc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tracks_keys() {
        let mut registry = DependencyRegistry::new();
        assert!(registry.is_empty());

        registry.instance(7_u32).singleton(|_| Ok(String::from("x")));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains::<u32>());
        assert!(registry.contains::<String>());
        assert!(!registry.contains::<i64>());
    }

    #[test]
    fn test_registry_override_keeps_single_key() {
        let mut registry = DependencyRegistry::new();
        registry.instance(1_u8);
        registry.factory(|_| Ok(2_u8));
        assert_eq!(registry.len(), 1);
    }
}
