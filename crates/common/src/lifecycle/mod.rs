//! Lifecycle management for registered components
//!
//! This module provides lazy construction, cached lookup and best-effort
//! teardown of components stored in a registry keyed by `(name, dimension)`:
//! - **[`component`]**: the [`Component`] trait, factories and cleanup actions
//! - **[`registry`]**: the [`ComponentRegistry`] storage trait and
//!   [`InMemoryRegistry`]
//! - **[`cache`]**: the concurrent [`ComponentCache`] of initialized values
//! - **[`manager`]**: [`ComponentLifecycleManager`], which ties them together
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use foundation_common::lifecycle::{
//!     downcast_component, Component, ComponentFactory, ComponentLifecycleManager,
//!     ComponentMetadata, InMemoryRegistry,
//! };
//!
//! struct Settings {
//!     verbose: bool,
//! }
//!
//! impl Component for Settings {}
//!
//! let manager = ComponentLifecycleManager::new(Arc::new(InMemoryRegistry::new()));
//! let factory = ComponentFactory::sync(|| Ok::<_, std::io::Error>(Settings { verbose: true }));
//! manager
//!     .register_component("settings", "core", None, ComponentMetadata::lazy(factory))
//!     .unwrap();
//!
//! let handle = manager.get_or_initialize_component("settings", "core").unwrap();
//! assert!(downcast_component::<Settings>(&handle).unwrap().verbose);
//! ```

pub mod cache;
pub mod component;
pub mod manager;
pub mod registry;

pub use cache::ComponentCache;
pub use component::{
    component_ref, downcast_component, AsAny, CleanupAction, Component, ComponentFactory,
    ComponentHandle,
};
pub use manager::{CleanupReport, ComponentLifecycleManager};
pub use registry::{
    ComponentEntry, ComponentKey, ComponentMetadata, ComponentRegistry, InMemoryRegistry,
};
