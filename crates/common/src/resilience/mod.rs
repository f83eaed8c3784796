//! Retry engine for fallible operations
//!
//! This module provides:
//! - **[`RetryPolicy`]**: immutable attempt budget, backoff shape, jitter and
//!   retry filters, with a validated builder and a TOML-friendly
//!   [`RetryPolicyConfig`]
//! - **[`RetryExecutor`]**: runs blocking or async operations under a policy,
//!   returning the operation's own error when retries end
//! - **[`Sleep`] / [`AsyncSleep`]**: injectable waiting primitives so tests
//!   never sleep for real
//! - **[`Clock`]**: time source used to report total elapsed time
//!
//! ## Backoff shapes
//!
//! | Strategy      | Delay after attempt `n`          |
//! |---------------|----------------------------------|
//! | `fixed`       | `base`                           |
//! | `linear`      | `base * n`                       |
//! | `exponential` | `base * 2^(n-1)`                 |
//! | `fibonacci`   | `base * fib(n)` (1, 1, 2, 3, 5)  |
//!
//! Every delay is capped at `max_delay`; with jitter enabled the capped
//! value is then scaled by a random factor in `[0.75, 1.25]`.
//!
//! ## Retry decisions
//!
//! Errors are matched by their [`ErrorCategory`](crate::error::ErrorCategory).
//! Without an allow-list every error is retried until the budget runs out.
//! Responses are matched by [`ResponseStatus`] and are never retried unless
//! status codes are configured.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use foundation_common::resilience::{BackoffStrategy, RetryExecutor, RetryPolicy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .backoff(BackoffStrategy::Fibonacci)
//!     .base_delay(Duration::from_millis(1))
//!     .max_delay(Duration::from_millis(10))
//!     .retryable_errors(["timeout", "io::timed_out"])
//!     .build()?;
//!
//! let mut calls = 0;
//! let value = RetryExecutor::new(policy).execute_sync(|| {
//!     calls += 1;
//!     if calls < 3 {
//!         Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
//!     } else {
//!         Ok(calls)
//!     }
//! })?;
//! assert_eq!(value, 3);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod error;
pub mod executor;
pub mod policy;
pub mod sleep;

pub use clock::{Clock, SystemClock};
pub use error::{RetryError, RetryResult};
pub use executor::{RetryExecutor, RetryObserver};
pub use policy::{
    BackoffStrategy, ResponseStatus, RetryPolicy, RetryPolicyBuilder, RetryPolicyConfig,
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
pub use sleep::{AsyncSleep, Sleep, ThreadSleep, TokioSleep};
