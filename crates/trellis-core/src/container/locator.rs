use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{Definition, FactoryFn, Rule, ServiceArc};
use crate::error::{ResolutionError, ResolutionResult};

/// Immutable service locator built by [`DependencyRegistry::build`].
///
/// Resolution is deterministic per key: singletons are cached after their
/// first construction, transient factories are re-invoked on every call.
///
/// Cycle detection is tracked per thread, so concurrent resolves of the same
/// key never see each other. Two threads racing on a singleton may both run
/// its factory; the first stored value wins.
///
/// [`DependencyRegistry::build`]: super::DependencyRegistry::build
pub struct Container {
    definitions: HashMap<TypeId, Definition>,
    singletons: Mutex<HashMap<TypeId, ServiceArc>>,
}

/// One key under construction on the current thread.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Resolving {
    container: usize,
    id: TypeId,
    name: &'static str,
}

thread_local! {
    /// Keys under construction on this thread, innermost last.
    static RESOLVING: RefCell<Vec<Resolving>> = const { RefCell::new(Vec::new()) };
}

impl Container {
    pub(crate) fn new(definitions: HashMap<TypeId, Definition>) -> Self {
        Self {
            definitions,
            singletons: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the service registered for `T`.
    pub fn resolve<T>(&self) -> ResolutionResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = type_name::<T>();
        let value = self.resolve_erased(TypeId::of::<T>(), name)?;
        value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ResolutionError::TypeMismatch { service: name })
    }

    /// Returns `true` if a rule is registered for `T`.
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.definitions.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn resolve_erased(&self, id: TypeId, name: &'static str) -> ResolutionResult<ServiceArc> {
        let definition = self
            .definitions
            .get(&id)
            .ok_or(ResolutionError::NotFound { service: name })?;

        match &definition.rule {
            Rule::Instance(value) => Ok(Arc::clone(value)),
            Rule::Singleton(factory) => {
                let cached = self.singletons.lock().get(&id).cloned();
                if let Some(value) = cached {
                    return Ok(value);
                }
                let value = self.construct(id, definition.name, factory)?;
                let mut singletons = self.singletons.lock();
                Ok(Arc::clone(singletons.entry(id).or_insert(value)))
            }
            Rule::Factory(factory) => self.construct(id, definition.name, factory),
            Rule::Alias {
                target,
                target_name,
                cast,
            } => {
                let _guard = self.enter(id, definition.name)?;
                let value = self.resolve_erased(*target, target_name)?;
                cast(value).ok_or(ResolutionError::TypeMismatch {
                    service: definition.name,
                })
            }
        }
    }

    fn construct(
        &self,
        id: TypeId,
        name: &'static str,
        factory: &FactoryFn,
    ) -> ResolutionResult<ServiceArc> {
        let _guard = self.enter(id, name)?;
        trace!(service = name, "Constructing service");
        factory(self).map_err(|source| match source.downcast::<ResolutionError>() {
            // Keep cycle reports flat instead of nesting them per factory.
            Ok(inner) if matches!(*inner, ResolutionError::Circular { .. }) => *inner,
            Ok(inner) => ResolutionError::Factory {
                service: name,
                source: inner,
            },
            Err(source) => ResolutionError::Factory {
                service: name,
                source,
            },
        })
    }

    fn enter(&self, id: TypeId, name: &'static str) -> ResolutionResult<ResolvingGuard> {
        let entry = Resolving {
            container: self as *const Self as usize,
            id,
            name,
        };
        RESOLVING.with_borrow_mut(|stack| {
            let container = entry.container;
            if stack.iter().any(|r| r.container == container && r.id == id) {
                let chain = stack
                    .iter()
                    .filter(|r| r.container == container)
                    .map(|r| r.name)
                    .chain(iter::once(name))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ResolutionError::Circular { chain });
            }
            stack.push(entry);
            Ok(ResolvingGuard { entry })
        })
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.definitions.values().map(|d| d.name).collect();
        names.sort_unstable();
        f.debug_struct("Container")
            .field("definitions", &names)
            .field("singletons", &self.singletons.lock().len())
            .finish()
    }
}

/// Removes its own entry from the thread's resolving stack when
/// construction of a key finishes.
struct ResolvingGuard {
    entry: Resolving,
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with_borrow_mut(|stack| {
            if let Some(index) = stack.iter().rposition(|r| *r == self.entry) {
                stack.remove(index);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::container::DependencyRegistry;
    use crate::error::BoxError;

    trait Greet: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Greeter(&'static str);

    impl Greet for Greeter {
        fn greet(&self) -> String {
            format!("hello {}", self.0)
        }
    }

    #[test]
    fn test_resolve_instance() {
        let mut registry = DependencyRegistry::new();
        registry.instance(String::from("value"));
        let container = registry.build();

        assert_eq!(*container.resolve::<String>().unwrap(), "value");
        assert!(container.has::<String>());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_singleton_is_cached() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut registry = DependencyRegistry::new();
        registry.singleton(|_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1_u8, 2, 3])
        });
        let container = registry.build();

        let a = container.resolve::<Vec<u8>>().unwrap();
        let b = container.resolve::<Vec<u8>>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_runs_every_time() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);

        let mut registry = DependencyRegistry::new();
        registry.factory(move |_| Ok(seen.fetch_add(1, Ordering::SeqCst)));
        let container = registry.build();

        assert_eq!(*container.resolve::<usize>().unwrap(), 0);
        assert_eq!(*container.resolve::<usize>().unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_last_definition_wins() {
        let mut registry = DependencyRegistry::new();
        registry.instance(String::from("first"));
        registry.singleton(|_| Ok(String::from("second")));
        let container = registry.build();

        assert_eq!(*container.resolve::<String>().unwrap(), "second");
    }

    #[test]
    fn test_factory_can_resolve_dependencies() {
        let mut registry = DependencyRegistry::new();
        registry.instance(21_u32);
        registry.singleton(|c| Ok(u64::from(*c.resolve::<u32>()?) * 2));
        let container = registry.build();

        assert_eq!(*container.resolve::<u64>().unwrap(), 42);
    }

    #[test]
    fn test_alias_to_trait_object() {
        let mut registry = DependencyRegistry::new();
        registry.singleton(|_| Ok(Greeter("trellis")));
        registry.alias::<dyn Greet, Greeter>(|g| g);
        let container = registry.build();

        let greet = container.resolve::<dyn Greet>().unwrap();
        assert_eq!(greet.greet(), "hello trellis");

        let concrete = container.resolve::<Greeter>().unwrap();
        assert_eq!(concrete.0, "trellis");
    }

    #[test]
    fn test_trait_object_singleton() {
        let mut registry = DependencyRegistry::new();
        registry.singleton_arc::<dyn Greet, _>(|_| Ok(Arc::new(Greeter("arc"))));
        let container = registry.build();

        assert_eq!(container.resolve::<dyn Greet>().unwrap().greet(), "hello arc");
    }

    #[test]
    fn test_missing_definition() {
        let container = DependencyRegistry::new().build();
        let err = container.resolve::<String>().unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound { .. }));
    }

    #[test]
    fn test_factory_error_is_wrapped() {
        let mut registry = DependencyRegistry::new();
        registry.singleton::<String, _>(|_| Err(BoxError::from("boom")));
        let container = registry.build();

        match container.resolve::<String>().unwrap_err() {
            ResolutionError::Factory { source, .. } => assert_eq!(source.to_string(), "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_circular_dependency_is_reported() {
        let mut registry = DependencyRegistry::new();
        registry.singleton(|c| Ok(*c.resolve::<u64>()? as u32));
        registry.singleton(|c| Ok(u64::from(*c.resolve::<u32>()?)));
        let container = registry.build();

        match container.resolve::<u32>().unwrap_err() {
            ResolutionError::Circular { chain } => {
                assert_eq!(chain, "u32 -> u64 -> u32");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The resolving stack unwinds, so unrelated lookups keep working.
        assert!(matches!(
            container.resolve::<String>().unwrap_err(),
            ResolutionError::NotFound { .. }
        ));
    }

    #[test]
    fn test_concurrent_resolves_are_not_circular() {
        let mut registry = DependencyRegistry::new();
        registry.factory(|_| {
            thread::sleep(Duration::from_millis(100));
            Ok(String::from("slow"))
        });
        let container = Arc::new(registry.build());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let container = Arc::clone(&container);
                thread::spawn(move || container.resolve::<String>().map(|s| s.to_string()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "slow");
        }
    }

    #[test]
    fn test_nested_containers_track_cycles_separately() {
        let mut inner = DependencyRegistry::new();
        inner.singleton(|_| Ok(7_u32));
        let inner = Arc::new(inner.build());

        let mut registry = DependencyRegistry::new();
        let nested = Arc::clone(&inner);
        registry.singleton(move |_| Ok(*nested.resolve::<u32>()?));
        let container = registry.build();

        // The outer container is building `u32` while the inner one resolves
        // its own `u32`; neither is a cycle.
        assert_eq!(*container.resolve::<u32>().unwrap(), 7);
    }
}
