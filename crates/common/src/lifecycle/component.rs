//! Component handles, factories and cleanup actions
//!
//! Components are stored type-erased as [`ComponentHandle`]s. Callers that
//! know the concrete type get it back with [`downcast_component`] or
//! [`component_ref`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::BoxError;

/// Shared, type-erased component instance
pub type ComponentHandle = Arc<dyn Component>;

type SyncFactoryFn = dyn Fn() -> Result<ComponentHandle, BoxError> + Send + Sync;
type AsyncFactoryFn =
    dyn Fn() -> BoxFuture<'static, Result<ComponentHandle, BoxError>> + Send + Sync;

/// Upcasting support so handles can be downcast to their concrete type
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A value managed by the lifecycle manager
///
/// Implementing the trait is enough to register a type; override
/// [`cleanup`](Component::cleanup) to take part in teardown.
///
/// ```rust
/// use std::sync::Arc;
///
/// use foundation_common::lifecycle::{CleanupAction, Component};
///
/// struct Pool;
///
/// impl Component for Pool {
///     fn cleanup(self: Arc<Self>) -> Option<CleanupAction> {
///         Some(CleanupAction::asynchronous(async move {
///             // close connections
///             Ok(())
///         }))
///     }
/// }
/// ```
pub trait Component: AsAny {
    /// Teardown work for this component, `None` when there is nothing to do
    fn cleanup(self: Arc<Self>) -> Option<CleanupAction> {
        None
    }
}

/// Teardown work returned by [`Component::cleanup`]
pub enum CleanupAction {
    /// Run inline on the calling thread
    Sync(Box<dyn FnOnce() -> Result<(), BoxError> + Send>),
    /// Run on a tokio runtime
    Async(BoxFuture<'static, Result<(), BoxError>>),
}

impl CleanupAction {
    /// Cleanup that runs on the calling thread
    pub fn sync<F>(cleanup: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::Sync(Box::new(cleanup))
    }

    /// Cleanup that needs a tokio runtime
    pub fn asynchronous<Fut>(cleanup: Fut) -> Self
    where
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::Async(cleanup.boxed())
    }

    /// Whether the cleanup has to be awaited
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("CleanupAction::Sync"),
            Self::Async(_) => f.write_str("CleanupAction::Async"),
        }
    }
}

/// Zero-argument constructor for a component
///
/// The variant is fixed when the factory is created, so the manager never
/// has to guess whether a factory needs awaiting.
#[derive(Clone)]
pub enum ComponentFactory {
    Sync(Arc<SyncFactoryFn>),
    Async(Arc<AsyncFactoryFn>),
}

impl ComponentFactory {
    /// Wrap a blocking constructor
    pub fn sync<F, C, E>(factory: F) -> Self
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
        C: Component,
        E: Into<BoxError>,
    {
        Self::Sync(Arc::new(move || match factory() {
            Ok(component) => Ok(Arc::new(component) as ComponentHandle),
            Err(err) => Err(err.into()),
        }))
    }

    /// Wrap an async constructor
    pub fn asynchronous<F, Fut, C, E>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, E>> + Send + 'static,
        C: Component,
        E: Into<BoxError>,
    {
        Self::Async(Arc::new(move || {
            factory()
                .map(|result| match result {
                    Ok(component) => Ok(Arc::new(component) as ComponentHandle),
                    Err(err) => Err(err.into()),
                })
                .boxed()
        }))
    }

    /// Whether the factory has to be awaited
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("ComponentFactory::Sync"),
            Self::Async(_) => f.write_str("ComponentFactory::Async"),
        }
    }
}

/// Recover the concrete `Arc<T>` behind a handle
pub fn downcast_component<T: Component>(handle: &ComponentHandle) -> Option<Arc<T>> {
    AsAny::as_any_arc(Arc::clone(handle)).downcast::<T>().ok()
}

/// Borrow the concrete `T` behind a handle
pub fn component_ref<T: Component>(handle: &ComponentHandle) -> Option<&T> {
    AsAny::as_any(&**handle).downcast_ref::<T>()
}
