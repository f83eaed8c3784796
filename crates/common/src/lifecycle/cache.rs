//! Cache of initialized components
//!
//! Owned by a [`ComponentLifecycleManager`](super::ComponentLifecycleManager)
//! and cheap to clone, so several managers can share one cache when they
//! front the same registry.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::component::ComponentHandle;
use super::registry::ComponentKey;

/// Concurrent map from component key to live instance
#[derive(Clone, Default)]
pub struct ComponentCache {
    inner: Arc<DashMap<ComponentKey, ComponentHandle>>,
}

impl ComponentCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance for `key`
    pub fn get(&self, key: &ComponentKey) -> Option<ComponentHandle> {
        self.inner.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `key` has a cached instance
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Store `value` unless the key is already present and return whichever
    /// value the cache holds afterwards. The check and the write happen under
    /// one shard lock, so the first writer always wins.
    pub fn insert_if_absent(&self, key: ComponentKey, value: ComponentHandle) -> ComponentHandle {
        Arc::clone(&self.inner.entry(key).or_insert(value))
    }

    /// Drop the cached instance for `key`, returning it
    pub fn remove(&self, key: &ComponentKey) -> Option<ComponentHandle> {
        self.inner.remove(key).map(|(_, value)| value)
    }

    /// Number of cached components
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Keys of every cached component, in no particular order
    pub fn keys(&self) -> Vec<ComponentKey> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop every cached instance
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl fmt::Debug for ComponentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::component::{component_ref, Component};

    struct Tagged(u32);

    impl Component for Tagged {}

    fn tag(handle: &ComponentHandle) -> u32 {
        component_ref::<Tagged>(handle).unwrap().0
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = ComponentCache::new();
        let key = ComponentKey::new("db", "storage");

        let first = cache.insert_if_absent(key.clone(), Arc::new(Tagged(1)));
        let second = cache.insert_if_absent(key.clone(), Arc::new(Tagged(2)));

        assert_eq!(tag(&first), 1);
        assert_eq!(tag(&second), 1);
        assert_eq!(tag(&cache.get(&key).unwrap()), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ComponentCache::new();
        let shared = cache.clone();
        let key = ComponentKey::new("queue", "messaging");

        shared.insert_if_absent(key.clone(), Arc::new(Tagged(9)));
        assert!(cache.contains(&key));
        assert_eq!(cache.keys(), vec![key.clone()]);

        assert!(cache.remove(&key).is_some());
        assert!(shared.is_empty());
    }

    /// Concurrent writers all observe the same winner.
    #[test]
    fn test_concurrent_insert_if_absent_agrees() {
        let cache = ComponentCache::new();
        let key = ComponentKey::new("db", "storage");

        let winners: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let cache = cache.clone();
                    let key = key.clone();
                    scope.spawn(move || tag(&cache.insert_if_absent(key, Arc::new(Tagged(n)))))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let stored = tag(&cache.get(&key).unwrap());
        assert!(winners.iter().all(|&w| w == stored));
    }
}
