//! The settings registry: named slots holding one typed configuration object each.
//!
//! The concrete type behind a name is fixed by the first [`insert`]; later
//! writes must use the same type.  Readers state the type they expect and get
//! [`ConfigError::NamespaceType`] when it does not match.
//!
//! The registry is shared (`Arc<Settings>`) between the container and every
//! package's settings hook, so it uses interior mutability.  It is mutable
//! throughout composition and treated as frozen once the framework runs.
//!
//! [`insert`]: Settings::insert

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::ConfigNamespace;
use crate::error::{ConfigError, ConfigResult};

struct Slot {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// Registry mapping a namespace name to a typed configuration object.
#[derive(Default)]
pub struct Settings {
    slots: RwLock<BTreeMap<String, Slot>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, replacing a previous value of the same type.
    pub fn insert<T>(&self, name: impl Into<String>, value: T) -> ConfigResult<()>
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(&name)
            && existing.type_id != TypeId::of::<T>()
        {
            return Err(ConfigError::NamespaceType {
                namespace: name,
                expected: existing.type_name,
            });
        }
        debug!(namespace = %name, kind = type_name::<T>(), "Settings namespace registered");
        slots.insert(
            name,
            Slot {
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                value: Box::new(value),
            },
        );
        Ok(())
    }

    /// Returns `true` if a namespace is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Registered namespace names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Runs `f` with a shared reference to the namespace value.
    pub fn with<T, R>(&self, name: &str, f: impl FnOnce(&T) -> R) -> ConfigResult<R>
    where
        T: Any + Send + Sync,
    {
        let slots = self.slots.read();
        let slot = slots
            .get(name)
            .ok_or_else(|| ConfigError::MissingNamespace(name.to_string()))?;
        let value = slot
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| ConfigError::NamespaceType {
                namespace: name.to_string(),
                expected: type_name::<T>(),
            })?;
        Ok(f(value))
    }

    /// Runs `f` with a mutable reference to the namespace value.
    pub fn update<T, R>(&self, name: &str, f: impl FnOnce(&mut T) -> R) -> ConfigResult<R>
    where
        T: Any + Send + Sync,
    {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(name)
            .ok_or_else(|| ConfigError::MissingNamespace(name.to_string()))?;
        let value = slot
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| ConfigError::NamespaceType {
                namespace: name.to_string(),
                expected: type_name::<T>(),
            })?;
        Ok(f(value))
    }

    /// Returns a clone of the namespace value.
    pub fn get<T>(&self, name: &str) -> ConfigResult<T>
    where
        T: Any + Send + Sync + Clone,
    {
        self.with(name, T::clone)
    }

    /// Registers a baseline namespace under its conventional name.
    pub fn insert_section<T: ConfigNamespace>(&self, value: T) -> ConfigResult<()> {
        self.insert(T::NAME, value)
    }

    /// Returns a clone of a baseline namespace.
    pub fn section<T: ConfigNamespace>(&self) -> ConfigResult<T> {
        self.get(T::NAME)
    }

    /// Mutates a baseline namespace in place.
    pub fn update_section<T: ConfigNamespace, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> ConfigResult<R> {
        self.update(T::NAME, f)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read();
        f.debug_map()
            .entries(slots.iter().map(|(name, slot)| (name, slot.type_name)))
            .finish()
    }
}
