//! Retry engine and component lifecycle management shared across services.
//!
//! # Safety and Quality
//!
//! This crate forbids unsafe code and never panics on caller input: policy
//! construction and configuration loading report errors, and user callbacks
//! (factories, cleanups, retry observers) have their panics contained.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and utilities (duration serde helpers)
//! - `runtime`: retry engine, lifecycle manager and test doubles (default)
//! - `test-utils`: `runtime` plus helpers for downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod lifecycle;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{BoxError, CommonError, CommonResult, ErrorCategory};
#[cfg(feature = "runtime")]
pub use lifecycle::{
    CleanupAction, CleanupReport, Component, ComponentCache, ComponentFactory, ComponentHandle,
    ComponentKey, ComponentLifecycleManager, ComponentMetadata, ComponentRegistry,
    InMemoryRegistry,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    AsyncSleep, BackoffStrategy, Clock, ResponseStatus, RetryError, RetryExecutor, RetryObserver,
    RetryPolicy, RetryPolicyBuilder, RetryPolicyConfig, RetryResult, Sleep, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;
