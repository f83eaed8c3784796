//! Component registry: entries keyed by `(name, dimension)`
//!
//! The lifecycle manager only talks to the [`ComponentRegistry`] trait, so
//! any store that can answer point lookups, replace entries and list them by
//! dimension can back it. [`InMemoryRegistry`] is the bundled store.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;

use super::component::{ComponentFactory, ComponentHandle};
use crate::error::{CommonError, CommonResult};

/// Composite registry key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    /// Component name, unique within its dimension
    pub name: String,
    /// Namespace the component belongs to
    pub dimension: String,
}

impl ComponentKey {
    /// Key for `name` within `dimension`
    pub fn new(name: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self { name: name.into(), dimension: dimension.into() }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dimension, self.name)
    }
}

/// How the manager should treat an entry
///
/// | Field              | Effect                                                   |
/// |--------------------|----------------------------------------------------------|
/// | `lazy`             | build on first `get_or_initialize_component`             |
/// | `is_async`         | build in `initialize_async_component` and bulk startup   |
/// | `factory`          | constructor used by either path                          |
/// | `priority`         | higher values start first during bulk startup            |
/// | `supports_cleanup` | include in `cleanup_all_components`                      |
#[derive(Debug, Clone, Default)]
pub struct ComponentMetadata {
    /// Build on first synchronous access
    pub lazy: bool,
    /// Build through the async paths
    pub is_async: bool,
    /// Constructor for either path
    pub factory: Option<ComponentFactory>,
    /// Bulk startup order, highest first
    pub priority: i32,
    /// Take part in cleanup passes
    pub supports_cleanup: bool,
}

impl ComponentMetadata {
    /// Metadata for a plain, pre-built entry: not lazy, not async, no
    /// factory, priority 0, no cleanup
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily built on first synchronous access
    pub fn lazy(factory: ComponentFactory) -> Self {
        Self { lazy: true, factory: Some(factory), ..Self::default() }
    }

    /// Built by the async initialization paths
    pub fn async_init(factory: ComponentFactory) -> Self {
        Self { is_async: true, factory: Some(factory), ..Self::default() }
    }

    /// Set the bulk startup priority (higher starts first)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Include the component in cleanup passes
    pub fn with_cleanup(mut self) -> Self {
        self.supports_cleanup = true;
        self
    }

    /// Replace the factory, keeping the other flags
    pub fn with_factory(mut self, factory: ComponentFactory) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// Snapshot of one registry entry
#[derive(Clone)]
pub struct ComponentEntry {
    /// Registry key
    pub key: ComponentKey,
    /// Live instance, `None` until built
    pub value: Option<ComponentHandle>,
    /// How the manager treats the entry
    pub metadata: ComponentMetadata,
}

impl ComponentEntry {
    /// Component name
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Component dimension
    pub fn dimension(&self) -> &str {
        &self.key.dimension
    }
}

impl fmt::Debug for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("key", &self.key)
            .field("initialized", &self.value.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Storage consumed by the lifecycle manager
///
/// Implementations synchronize individual calls; the manager does not rely
/// on atomicity across calls.
pub trait ComponentRegistry: Send + Sync {
    /// Snapshot of the entry for `key`
    fn get_entry(&self, key: &ComponentKey) -> Option<ComponentEntry>;

    /// Store an entry. Fails with a validation error when `key` exists and
    /// `replace` is false.
    fn register(
        &self,
        key: ComponentKey,
        value: Option<ComponentHandle>,
        metadata: ComponentMetadata,
        replace: bool,
    ) -> CommonResult<()>;

    /// All entries, or only those in `dimension`
    fn entries(&self, dimension: Option<&str>) -> Vec<ComponentEntry>;
}

/// Registry backed by an ordered map; iteration follows key order
#[derive(Default)]
pub struct InMemoryRegistry {
    entries: RwLock<BTreeMap<ComponentKey, ComponentEntry>>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `key` is registered
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Drop an entry, returning it
    pub fn remove(&self, key: &ComponentKey) -> Option<ComponentEntry> {
        self.entries.write().remove(key)
    }
}

impl ComponentRegistry for InMemoryRegistry {
    fn get_entry(&self, key: &ComponentKey) -> Option<ComponentEntry> {
        self.entries.read().get(key).cloned()
    }

    fn register(
        &self,
        key: ComponentKey,
        value: Option<ComponentHandle>,
        metadata: ComponentMetadata,
        replace: bool,
    ) -> CommonResult<()> {
        let mut entries = self.entries.write();
        if !replace && entries.contains_key(&key) {
            return Err(CommonError::validation_with_value(
                "component",
                "component is already registered",
                key.to_string(),
            ));
        }

        entries.insert(key.clone(), ComponentEntry { key, value, metadata });
        Ok(())
    }

    fn entries(&self, dimension: Option<&str>) -> Vec<ComponentEntry> {
        self.entries
            .read()
            .values()
            .filter(|entry| dimension.map_or(true, |d| entry.key.dimension == d))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegistry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lifecycle::component::Component;

    struct Marker;

    impl Component for Marker {}

    #[test]
    fn test_register_and_get_entry() {
        let registry = InMemoryRegistry::new();
        let key = ComponentKey::new("db", "storage");

        registry
            .register(key.clone(), Some(Arc::new(Marker)), ComponentMetadata::new(), false)
            .unwrap();

        let entry = registry.get_entry(&key).unwrap();
        assert_eq!(entry.name(), "db");
        assert_eq!(entry.dimension(), "storage");
        assert!(entry.value.is_some());
        assert!(registry.get_entry(&ComponentKey::new("db", "cache")).is_none());
    }

    #[test]
    fn test_duplicate_registration_requires_replace() {
        let registry = InMemoryRegistry::new();
        let key = ComponentKey::new("db", "storage");
        registry.register(key.clone(), None, ComponentMetadata::new(), false).unwrap();

        let err = registry
            .register(key.clone(), None, ComponentMetadata::new(), false)
            .unwrap_err();
        assert!(matches!(err, CommonError::Validation { .. }));

        registry
            .register(key.clone(), Some(Arc::new(Marker)), ComponentMetadata::new(), true)
            .unwrap();
        assert!(registry.get_entry(&key).unwrap().value.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entries_filter_by_dimension() {
        let registry = InMemoryRegistry::new();
        for (name, dimension) in [("a", "dimA"), ("b", "dimB"), ("c", "dimB")] {
            registry
                .register(ComponentKey::new(name, dimension), None, ComponentMetadata::new(), false)
                .unwrap();
        }

        let names: Vec<_> =
            registry.entries(Some("dimB")).into_iter().map(|e| e.key.name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(registry.entries(None).len(), 3);
        assert!(registry.entries(Some("dimC")).is_empty());
    }

    #[test]
    fn test_metadata_builders() {
        let factory = ComponentFactory::sync(|| Ok::<_, std::io::Error>(Marker));

        let lazy = ComponentMetadata::lazy(factory.clone()).with_cleanup();
        assert!(lazy.lazy && lazy.supports_cleanup && !lazy.is_async);

        let eager = ComponentMetadata::async_init(factory).with_priority(7);
        assert!(eager.is_async && !eager.lazy);
        assert_eq!(eager.priority, 7);
        assert_eq!(ComponentKey::new("db", "storage").to_string(), "storage/db");
    }
}
