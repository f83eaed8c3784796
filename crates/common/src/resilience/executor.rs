//! Retry executor for synchronous and asynchronous operations
//!
//! [`RetryExecutor`] drives a fallible operation through the attempt budget of
//! a [`RetryPolicy`]. The error returned to the caller is always the
//! operation's own error, either from the final attempt or from the first
//! attempt the policy refuses to retry.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::policy::RetryPolicy;
use super::sleep::{AsyncSleep, Sleep, ThreadSleep, TokioSleep};
use crate::error::{BoxError, ErrorCategory};
use crate::utils::panic::{catch_panic, catch_panic_async};

type SyncObserverFn = dyn Fn(u32, &dyn fmt::Display) -> Result<(), BoxError> + Send + Sync;
type AsyncObserverFn =
    dyn Fn(u32, String) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// Callback invoked before each retry with the failed attempt number and error
///
/// Observers are notified after the retry is logged and before the delay
/// starts. A failing or panicking observer is logged at `warn` level and
/// never interrupts the retry loop.
#[derive(Clone)]
pub enum RetryObserver {
    /// Called inline on the retrying thread or task
    Sync(Arc<SyncObserverFn>),
    /// Awaited by `execute_async`; see [`RetryExecutor::execute_sync`] for
    /// how the blocking path runs it
    Async(Arc<AsyncObserverFn>),
}

impl RetryObserver {
    /// Wrap a blocking callback
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(u32, &dyn fmt::Display) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(callback))
    }

    /// Wrap an asynchronous callback. The error is passed rendered as text so
    /// the returned future can outlive the borrow of the original error.
    pub fn asynchronous<F, Fut>(callback: F) -> Self
    where
        F: Fn(u32, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::Async(Arc::new(move |attempt, error| callback(attempt, error).boxed()))
    }

    /// Notify from a blocking context
    ///
    /// Async observers cannot be blocked on from inside a tokio runtime: the
    /// thread being blocked may be the one that has to drive the observer's
    /// timers or I/O. There they are spawned onto the runtime and not
    /// awaited. Outside a runtime they run to completion on a temporary
    /// current-thread runtime.
    fn notify_blocking(&self, attempt: u32, error: &dyn fmt::Display) {
        let pending = match self {
            Self::Sync(callback) => {
                log_observer_outcome(attempt, catch_panic(|| callback(attempt, error)));
                return;
            }
            Self::Async(callback) => catch_panic_async(callback(attempt, error.to_string())),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn(async move { log_observer_outcome(attempt, pending.await) }));
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => log_observer_outcome(attempt, runtime.block_on(pending)),
                Err(err) => {
                    warn!(attempt, error = %err, "Failed to start runtime for retry observer");
                }
            },
        }
    }

    /// Notify from an async context. Sync observers run immediately; async
    /// observers come back as a future for the caller to await.
    fn notify(
        &self,
        attempt: u32,
        error: &dyn fmt::Display,
    ) -> Option<BoxFuture<'static, Result<(), BoxError>>> {
        match self {
            Self::Sync(callback) => {
                log_observer_outcome(attempt, catch_panic(|| callback(attempt, error)));
                None
            }
            Self::Async(callback) => Some(callback(attempt, error.to_string())),
        }
    }
}

impl fmt::Debug for RetryObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("RetryObserver::Sync"),
            Self::Async(_) => f.write_str("RetryObserver::Async"),
        }
    }
}

fn log_observer_outcome(
    attempt: u32,
    outcome: Result<Result<(), BoxError>, crate::utils::panic::PanicError>,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(attempt, error = %err, "Retry observer failed"),
        Err(panic) => warn!(attempt, error = %panic, "Retry observer panicked"),
    }
}

/// What the loop does after a failed attempt
enum Step {
    Stop,
    Retry(Duration),
}

/// Runs operations under a [`RetryPolicy`]
///
/// The executor keeps no state between calls; clones share the policy and
/// the injected primitives.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: Arc<RetryPolicy>,
    observer: Option<RetryObserver>,
    clock: Arc<dyn Clock>,
    sleep: Arc<dyn Sleep>,
    async_sleep: Arc<dyn AsyncSleep>,
}

impl RetryExecutor {
    /// Create an executor that sleeps for real and reads the system clock
    pub fn new(policy: impl Into<Arc<RetryPolicy>>) -> Self {
        Self {
            policy: policy.into(),
            observer: None,
            clock: Arc::new(SystemClock),
            sleep: Arc::new(ThreadSleep),
            async_sleep: Arc::new(TokioSleep),
        }
    }

    /// Replace the clock used to measure total elapsed time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the blocking sleep used by `execute_sync`
    pub fn with_sleep(mut self, sleep: Arc<dyn Sleep>) -> Self {
        self.sleep = sleep;
        self
    }

    /// Replace the async sleep used by `execute_async`
    pub fn with_async_sleep(mut self, sleep: Arc<dyn AsyncSleep>) -> Self {
        self.async_sleep = sleep;
        self
    }

    /// Register a callback notified before every retry
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Policy driving this executor
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, the policy refuses to retry, or the
    /// attempt budget is spent. Sleeps between attempts block the thread.
    ///
    /// An [`RetryObserver::Async`] runs to completion before the delay when
    /// no tokio runtime is entered. Inside a runtime it is spawned and the
    /// loop does not wait for it.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts()))]
    pub fn execute_sync<F, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: ErrorCategory + fmt::Display,
    {
        let started = self.clock.now();
        let mut attempt = 1;

        loop {
            let error = match operation() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.next_step(&error, attempt, started) {
                Step::Stop => return Err(error),
                Step::Retry(delay) => {
                    if let Some(observer) = &self.observer {
                        observer.notify_blocking(attempt, &error);
                    }
                    Sleep::sleep(&*self.sleep, delay);
                }
            }

            attempt += 1;
        }
    }

    /// Async counterpart of [`execute_sync`](Self::execute_sync). The
    /// operation, the delay and async observers are awaited.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts()))]
    pub async fn execute_async<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorCategory + fmt::Display,
    {
        let started = self.clock.now();
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.next_step(&error, attempt, started) {
                Step::Stop => return Err(error),
                Step::Retry(delay) => {
                    let pending = self.observer.as_ref().and_then(|o| o.notify(attempt, &error));
                    if let Some(pending) = pending {
                        log_observer_outcome(attempt, catch_panic_async(pending).await);
                    }
                    AsyncSleep::sleep(&*self.async_sleep, delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// Decide what follows a failed attempt and log the decision
    fn next_step<E>(&self, err: &E, attempt: u32, started: std::time::Instant) -> Step
    where
        E: ErrorCategory + fmt::Display + ?Sized,
    {
        let max_attempts = self.policy.max_attempts();

        if attempt >= max_attempts {
            let elapsed_ms = self.clock.elapsed_since(started).as_millis() as u64;
            error!(
                attempts = attempt,
                elapsed_ms,
                error = %err,
                "Operation failed after all retry attempts"
            );
            return Step::Stop;
        }

        if !self.policy.should_retry(err, attempt) {
            debug!(attempt, category = err.category(), error = %err, "Error is not retryable");
            return Step::Stop;
        }

        let delay = self.policy.calculate_delay(attempt);
        info!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, retrying"
        );
        Step::Retry(delay)
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}
