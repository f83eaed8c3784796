//! Lazy initialization and best-effort teardown of registered components
//!
//! The manager keeps failures quiet: factory and cleanup errors (panics
//! included) are logged with the component's name and dimension, and
//! initialization returns `None` instead of an error. Callers that need to
//! tell "not registered" from "failed" have to consult the logs.
//!
//! Two callers racing on the same key may both run the factory. The cache
//! keeps the first successful result and every caller receives that value.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use super::cache::ComponentCache;
use super::component::{CleanupAction, ComponentFactory, ComponentHandle};
use super::registry::{ComponentEntry, ComponentKey, ComponentMetadata, ComponentRegistry};
use crate::error::{BoxError, CommonResult};
use crate::utils::panic::{catch_panic, catch_panic_async, PanicError};

/// Outcome counts of [`ComponentLifecycleManager::cleanup_all_components_async`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Cleanups that completed successfully
    pub cleaned: usize,
    /// Cleanups that returned an error or panicked
    pub failed: usize,
    /// Async cleanups that did not finish within the timeout
    pub timed_out: usize,
}

impl CleanupReport {
    /// Components whose cleanup was attempted
    pub fn total(&self) -> usize {
        self.cleaned + self.failed + self.timed_out
    }

    /// True when nothing failed or timed out
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Turns a caught panic into an ordinary error
fn flatten_panic<T>(outcome: Result<Result<T, BoxError>, PanicError>) -> Result<T, BoxError> {
    outcome.map_err(BoxError::from).and_then(|result| result)
}

/// Lifecycle manager over a [`ComponentRegistry`]
pub struct ComponentLifecycleManager {
    registry: Arc<dyn ComponentRegistry>,
    cache: ComponentCache,
}

impl ComponentLifecycleManager {
    /// Create a manager with its own empty cache
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        Self::with_cache(registry, ComponentCache::new())
    }

    /// Create a manager that publishes into `cache`
    pub fn with_cache(registry: Arc<dyn ComponentRegistry>, cache: ComponentCache) -> Self {
        Self { registry, cache }
    }

    /// Registry backing this manager
    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    /// Cache of initialized components
    pub fn cache(&self) -> &ComponentCache {
        &self.cache
    }

    /// Add a new entry; fails if `(name, dimension)` is already registered
    pub fn register_component(
        &self,
        name: &str,
        dimension: &str,
        value: Option<ComponentHandle>,
        metadata: ComponentMetadata,
    ) -> CommonResult<()> {
        self.registry.register(ComponentKey::new(name, dimension), value, metadata, false)
    }

    /// Whether the component is in the initialized cache
    pub fn is_initialized(&self, name: &str, dimension: &str) -> bool {
        self.cache.contains(&ComponentKey::new(name, dimension))
    }

    /// Number of cached components
    pub fn initialized_count(&self) -> usize {
        self.cache.len()
    }

    /// Remove a component from the cache so the next lookup consults the
    /// registry again. The registry entry is left as is.
    pub fn forget_component(&self, name: &str, dimension: &str) -> Option<ComponentHandle> {
        self.cache.remove(&ComponentKey::new(name, dimension))
    }

    /// Return the component, building it with its synchronous factory on
    /// first use
    ///
    /// Lookup order: cache, then the registry value, then the factory of a
    /// `lazy` entry. Entries whose factory is async are not built here; use
    /// [`initialize_async_component`](Self::initialize_async_component).
    pub fn get_or_initialize_component(
        &self,
        name: &str,
        dimension: &str,
    ) -> Option<ComponentHandle> {
        let key = ComponentKey::new(name, dimension);
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }

        let entry = self.registry.get_entry(&key)?;
        if let Some(value) = entry.value {
            return Some(self.cache.insert_if_absent(key, value));
        }

        if !entry.metadata.lazy {
            return None;
        }

        match &entry.metadata.factory {
            Some(ComponentFactory::Sync(factory)) => {
                match flatten_panic(catch_panic(|| factory())) {
                    Ok(value) => Some(self.publish(key, value, entry.metadata.clone())),
                    Err(err) => {
                        error!(
                            component = name,
                            dimension,
                            error = %err,
                            "Failed to initialize lazy component"
                        );
                        None
                    }
                }
            }
            Some(ComponentFactory::Async(_)) => {
                debug!(
                    component = name,
                    dimension, "Lazy component has an async factory; skipping synchronous init"
                );
                None
            }
            None => None,
        }
    }

    /// Return the component, building it with its factory when the entry is
    /// marked `is_async`
    ///
    /// Async factories are awaited and sync factories are called inline. The
    /// cache is checked again right before the factory runs, and a result is
    /// only published when no other caller got there first.
    pub async fn initialize_async_component(
        &self,
        name: &str,
        dimension: &str,
    ) -> Option<ComponentHandle> {
        let key = ComponentKey::new(name, dimension);
        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }

        let entry = self.registry.get_entry(&key)?;
        let factory = match (&entry.metadata.factory, entry.metadata.is_async) {
            (Some(factory), true) => factory.clone(),
            _ => return entry.value,
        };

        if let Some(cached) = self.cache.get(&key) {
            return Some(cached);
        }

        let produced = match factory {
            ComponentFactory::Async(factory) => {
                flatten_panic(catch_panic_async(async move { factory().await }).await)
            }
            ComponentFactory::Sync(factory) => flatten_panic(catch_panic(|| factory())),
        };

        match produced {
            Ok(value) => Some(self.publish(key, value, entry.metadata)),
            Err(err) => {
                error!(
                    component = name,
                    dimension,
                    error = %err,
                    "Failed to initialize async component"
                );
                None
            }
        }
    }

    /// Initialize every `is_async` entry, highest priority first, one at a
    /// time. A failing component is logged and the batch moves on.
    pub async fn initialize_all_async_components(&self) {
        let mut entries: Vec<ComponentEntry> = self
            .registry
            .entries(None)
            .into_iter()
            .filter(|entry| entry.metadata.is_async)
            .collect();
        // Stable: equal priorities keep registry order.
        entries.sort_by(|a, b| b.metadata.priority.cmp(&a.metadata.priority));

        info!(count = entries.len(), "Initializing async components");

        for entry in entries {
            let (name, dimension) = (entry.name(), entry.dimension());
            debug!(
                component = name,
                dimension,
                priority = entry.metadata.priority,
                "Initializing async component"
            );

            match catch_panic_async(self.initialize_async_component(name, dimension)).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(component = name, dimension, "Async component is unavailable");
                }
                Err(panic) => {
                    error!(
                        component = name,
                        dimension,
                        error = %panic,
                        "Async component initialization panicked"
                    );
                }
            }
        }
    }

    /// Run the cleanup of every `supports_cleanup` component, optionally
    /// limited to one dimension
    ///
    /// Sync cleanups run inline. Async cleanups are spawned onto the current
    /// tokio runtime and not awaited; outside a runtime they run to
    /// completion on a temporary current-thread runtime. Failures are logged
    /// and never stop the remaining cleanups. The cache is not purged.
    pub fn cleanup_all_components(&self, dimension: Option<&str>) {
        for entry in self.registry.entries(dimension) {
            let Some(action) = Self::cleanup_action(&entry) else {
                continue;
            };

            match action {
                CleanupAction::Sync(run) => {
                    Self::log_cleanup(&entry.key, flatten_panic(catch_panic(run)));
                }
                CleanupAction::Async(run) => Self::run_detached(entry.key, run),
            }
        }
    }

    /// Like [`cleanup_all_components`](Self::cleanup_all_components) but
    /// awaits every async cleanup, bounding each one by `timeout`
    pub async fn cleanup_all_components_async(
        &self,
        dimension: Option<&str>,
        timeout: Duration,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        for entry in self.registry.entries(dimension) {
            let Some(action) = Self::cleanup_action(&entry) else {
                continue;
            };

            let outcome = match action {
                CleanupAction::Sync(run) => flatten_panic(catch_panic(run)),
                CleanupAction::Async(run) => {
                    match tokio::time::timeout(timeout, catch_panic_async(run)).await {
                        Ok(outcome) => flatten_panic(outcome),
                        Err(_) => {
                            error!(
                                component = %entry.key.name,
                                dimension = %entry.key.dimension,
                                timeout_ms = timeout.as_millis() as u64,
                                "Component cleanup timed out"
                            );
                            report.timed_out += 1;
                            continue;
                        }
                    }
                }
            };

            if outcome.is_ok() {
                report.cleaned += 1;
            } else {
                report.failed += 1;
            }
            Self::log_cleanup(&entry.key, outcome);
        }

        info!(
            cleaned = report.cleaned,
            failed = report.failed,
            timed_out = report.timed_out,
            "Component cleanup finished"
        );
        report
    }

    /// Offer a freshly built value to the cache and return the value the
    /// cache settled on. Only the winning caller writes it back to the
    /// registry, so cleanup always sees the instance handed out to callers.
    fn publish(
        &self,
        key: ComponentKey,
        value: ComponentHandle,
        metadata: ComponentMetadata,
    ) -> ComponentHandle {
        let winner = self.cache.insert_if_absent(key.clone(), Arc::clone(&value));
        if !Arc::ptr_eq(&winner, &value) {
            debug!(
                component = %key.name,
                dimension = %key.dimension,
                "Discarding component built by a losing initializer"
            );
            return winner;
        }

        if let Err(err) =
            self.registry.register(key.clone(), Some(Arc::clone(&winner)), metadata, true)
        {
            warn!(
                component = %key.name,
                dimension = %key.dimension,
                error = %err,
                "Failed to store initialized component in registry"
            );
        }

        info!(component = %key.name, dimension = %key.dimension, "Component initialized");
        winner
    }

    /// Cleanup work for an entry, if it supports cleanup and has a value
    fn cleanup_action(entry: &ComponentEntry) -> Option<CleanupAction> {
        if !entry.metadata.supports_cleanup {
            return None;
        }
        let value = entry.value.as_ref()?;

        match catch_panic(|| Arc::clone(value).cleanup()) {
            Ok(action) => action,
            Err(panic) => {
                error!(
                    component = %entry.key.name,
                    dimension = %entry.key.dimension,
                    error = %panic,
                    "Failed to prepare component cleanup"
                );
                None
            }
        }
    }

    fn log_cleanup(key: &ComponentKey, outcome: Result<(), BoxError>) {
        match outcome {
            Ok(()) => {
                debug!(component = %key.name, dimension = %key.dimension, "Component cleaned up");
            }
            Err(err) => error!(
                component = %key.name,
                dimension = %key.dimension,
                error = %err,
                "Component cleanup failed"
            ),
        }
    }

    fn run_detached(key: ComponentKey, cleanup: BoxFuture<'static, Result<(), BoxError>>) {
        let task = async move {
            let outcome = flatten_panic(catch_panic_async(cleanup).await);
            Self::log_cleanup(&key, outcome);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // Not joined: teardown does not wait for async cleanups.
                drop(handle.spawn(task));
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime.block_on(task),
                Err(err) => {
                    error!(error = %err, "Failed to start runtime for async component cleanup");
                }
            },
        }
    }
}

impl std::fmt::Debug for ComponentLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLifecycleManager")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
