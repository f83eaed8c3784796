//! Fake sleep for retry tests
//!
//! [`RecordingSleeper`] implements both [`Sleep`] and [`AsyncSleep`]. It
//! returns immediately, remembers every requested delay and, when built with
//! a [`MockClock`], advances that clock so elapsed-time reporting stays
//! consistent with the recorded delays.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::time::MockClock;
use crate::resilience::{AsyncSleep, Sleep};

/// Records requested delays instead of waiting
///
/// Clones share the same recording, so a clone can be injected into the
/// executor while the test keeps the original for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
    clock: Option<MockClock>,
}

impl RecordingSleeper {
    /// Recorder without a clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by every recorded delay
    pub fn with_clock(clock: MockClock) -> Self {
        Self { delays: Arc::default(), clock: Some(clock) }
    }

    fn record(&self, duration: Duration) {
        self.delays.lock().push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
    }

    /// Every delay requested so far, in order
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Number of sleeps requested
    #[must_use]
    pub fn count(&self) -> usize {
        self.delays.lock().len()
    }

    /// Sum of all requested delays
    #[must_use]
    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }

    /// Forget every recorded delay
    pub fn reset(&self) {
        self.delays.lock().clear();
    }
}

impl Sleep for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.record(duration);
    }
}

#[async_trait]
impl AsyncSleep for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.record(duration);
    }
}
