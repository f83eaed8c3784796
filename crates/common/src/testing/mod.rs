//! Testing utilities and helpers
//!
//! This module provides the deterministic doubles used by the crate's own
//! tests and by downstream test suites:
//! - **[`time`]**: [`MockClock`], a controllable [`Clock`](crate::resilience::Clock)
//! - **[`sleep`]**: [`RecordingSleeper`], a fake sync and async sleep
//! - **[`logs`]**: [`CapturedLogs`], in-memory capture of tracing output
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use foundation_common::resilience::{RetryExecutor, RetryPolicy};
//! use foundation_common::testing::{MockClock, RecordingSleeper};
//!
//! let clock = MockClock::new();
//! let sleeper = RecordingSleeper::with_clock(clock.clone());
//! let executor = RetryExecutor::new(RetryPolicy::fixed(3, Duration::from_secs(1)).unwrap())
//!     .with_clock(Arc::new(clock.clone()))
//!     .with_sleep(Arc::new(sleeper.clone()));
//!
//! let result: Result<(), std::io::Error> =
//!     executor.execute_sync(|| Err(std::io::ErrorKind::TimedOut.into()));
//!
//! assert!(result.is_err());
//! assert_eq!(sleeper.count(), 2);
//! assert_eq!(clock.elapsed(), Duration::from_secs(2));
//! ```

pub mod logs;
pub mod sleep;
pub mod time;

pub use logs::CapturedLogs;
pub use sleep::RecordingSleeper;
pub use time::MockClock;
