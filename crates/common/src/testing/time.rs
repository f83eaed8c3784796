//! Controllable clock for tests
//!
//! The retry executor reads time through [`Clock`] so that tests can drive
//! it with a [`MockClock`] instead of waiting for real time to pass.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use foundation_common::resilience::Clock;
//! use foundation_common::testing::MockClock;
//!
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::resilience::Clock;

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a clone handed to the code under
/// test observes every [`MockClock::advance`] made by the test.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed += duration;
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed = duration;
    }

    /// Get the simulated time since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}
