//! Common utility functions
//!
//! This module provides reusable utilities including:
//! - **[`serde`]**: Serialization helpers for durations in configuration files
//! - **[`panic`]**: Conversion of caught panics into ordinary errors

#[cfg(feature = "runtime")]
pub mod panic;
pub mod serde;

#[cfg(feature = "runtime")]
pub use self::panic::{catch_panic, catch_panic_async, PanicError};
pub use self::serde::duration_millis;
