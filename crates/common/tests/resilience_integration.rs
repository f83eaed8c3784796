//! Integration tests for the retry engine
//!
//! Exercises policies loaded from configuration, the executor's logging and
//! the interplay between injected clocks and sleeps.

#![cfg(feature = "runtime")]

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foundation_common::resilience::{
    BackoffStrategy, RetryError, RetryExecutor, RetryObserver, RetryPolicy, RetryPolicyConfig,
};
use foundation_common::testing::{CapturedLogs, MockClock, RecordingSleeper};
use foundation_common::{CommonError, ErrorCategory};
use tracing::Level;

/// Custom error type for testing
#[derive(Debug, Clone, PartialEq)]
struct TestError {
    category: &'static str,
    message: String,
}

impl TestError {
    fn new(category: &'static str, message: impl Into<String>) -> Self {
        Self { category, message: message.into() }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

impl ErrorCategory for TestError {
    fn category(&self) -> &'static str {
        self.category
    }
}

fn recording_executor(policy: RetryPolicy) -> (RetryExecutor, RecordingSleeper, MockClock) {
    let clock = MockClock::new();
    let sleeper = RecordingSleeper::with_clock(clock.clone());
    let executor = RetryExecutor::new(policy)
        .with_clock(Arc::new(clock.clone()))
        .with_sleep(Arc::new(sleeper.clone()))
        .with_async_sleep(Arc::new(sleeper.clone()));
    (executor, sleeper, clock)
}

/// Validates a policy read from a TOML file drives the executor.
///
/// # Test Steps
/// 1. Write a fibonacci policy with an error allow-list to a temp file
/// 2. Load and validate it
/// 3. Run an operation that times out twice, then succeeds
/// 4. Confirm the sleeps follow the fibonacci shape
#[test]
fn test_policy_from_toml_file_drives_executor() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
max_attempts = 5
backoff = "fibonacci"
base_delay_ms = 100
max_delay_ms = 1000
jitter = false
retryable_errors = ["timeout"]
"#
    )?;

    let policy = RetryPolicyConfig::from_toml_file(file.path())?.into_policy()?;
    let (executor, sleeper, _) = recording_executor(policy);
    let mut calls = 0;

    let value = executor.execute_sync(|| {
        calls += 1;
        if calls < 4 {
            Err(CommonError::timeout("fetch", Duration::from_millis(50)))
        } else {
            Ok(calls)
        }
    })?;

    assert_eq!(value, 4);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(100), Duration::from_millis(200)]
    );
    Ok(())
}

#[test]
fn test_missing_policy_file_is_reported() {
    let result = RetryPolicyConfig::from_toml_file("/nonexistent/retry-policy.toml");
    match result {
        Err(RetryError::Common(CommonError::Persistence { operation: Some(operation), .. })) => {
            assert!(operation.contains("/nonexistent/retry-policy.toml"));
        }
        other => panic!("expected a persistence error, got {other:?}"),
    }
}

/// Validates io errors are matched by their kind-specific category.
#[test]
fn test_io_error_categories_filter_retries() {
    let policy = RetryPolicy::builder()
        .max_attempts(3)
        .base_delay(Duration::from_millis(5))
        .max_delay(Duration::from_millis(5))
        .no_jitter()
        .retryable_errors(["io::connection_reset"])
        .build()
        .unwrap();
    let (executor, sleeper, _) = recording_executor(policy);

    let reset: Result<(), std::io::Error> =
        executor.execute_sync(|| Err(std::io::ErrorKind::ConnectionReset.into()));
    assert_eq!(reset.unwrap_err().kind(), std::io::ErrorKind::ConnectionReset);
    assert_eq!(sleeper.count(), 2);

    sleeper.reset();
    let denied: Result<(), std::io::Error> =
        executor.execute_sync(|| Err(std::io::ErrorKind::PermissionDenied.into()));
    assert_eq!(denied.unwrap_err().kind(), std::io::ErrorKind::PermissionDenied);
    assert_eq!(sleeper.count(), 0);
}

/// Validates the log events emitted over a failing run.
///
/// # Test Steps
/// 1. Capture logs for a 3-attempt fixed policy
/// 2. Fail every attempt
/// 3. Expect one info event per retry and one error event at exhaustion,
///    with elapsed time taken from the mock clock
#[test]
fn test_exhaustion_is_logged_with_elapsed_time() {
    let logs = CapturedLogs::capture();
    let policy = RetryPolicy::fixed(3, Duration::from_secs(1)).unwrap();
    let (executor, _, clock) = recording_executor(policy);

    let result: Result<(), TestError> =
        executor.execute_sync(|| Err(TestError::new("backend", "upstream unavailable")));

    assert!(result.is_err());
    assert_eq!(clock.elapsed(), Duration::from_secs(2));
    assert_eq!(logs.count_at(Level::INFO), 2);

    let errors = logs.lines_at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("attempts=3"));
    assert!(errors[0].contains("elapsed_ms=2000"));
    assert!(errors[0].contains("upstream unavailable"));
}

#[test]
fn test_non_retryable_stop_is_not_an_error_event() {
    let logs = CapturedLogs::capture();
    let policy =
        RetryPolicy::builder().max_attempts(3).retryable_errors(["timeout"]).build().unwrap();
    let (executor, sleeper, _) = recording_executor(policy);

    let result: Result<(), TestError> =
        executor.execute_sync(|| Err(TestError::new("validation", "bad input")));

    assert_eq!(result.unwrap_err().category(), "validation");
    assert_eq!(sleeper.count(), 0);
    assert_eq!(logs.count_at(Level::ERROR), 0);
    assert_eq!(logs.count_at(Level::DEBUG), 1);
}

/// Observer failures surface as warnings only.
#[test]
fn test_observer_failures_are_logged_as_warnings() {
    let logs = CapturedLogs::capture();
    let policy = RetryPolicy::fixed(3, Duration::ZERO).unwrap();
    let (executor, _, _) = recording_executor(policy);
    let executor =
        executor.with_observer(RetryObserver::sync(|_, _| Err("metrics sink offline".into())));

    let result: Result<(), TestError> =
        executor.execute_sync(|| Err(TestError::new("timeout", "slow")));

    assert!(result.is_err());
    let warnings = logs.lines_at(Level::WARN);
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|line| line.contains("metrics sink offline")));
}

/// Validates the async path waits through tokio's timer.
///
/// Runs on paused time so the 1s + 2s backoff completes instantly.
#[tokio::test(start_paused = true)]
async fn test_async_retry_uses_tokio_timer() {
    let policy = RetryPolicy::new(
        3,
        BackoffStrategy::Exponential,
        Duration::from_secs(1),
        Duration::from_secs(10),
        false,
    )
    .unwrap();
    let executor = RetryExecutor::new(policy);
    let attempts = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    let result = executor
        .execute_async(|| {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::new("timeout", "not yet"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

    assert_eq!(result, Ok("done"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

/// Validates one executor can serve concurrent tasks independently.
#[tokio::test(flavor = "multi_thread")]
async fn test_shared_executor_serves_concurrent_tasks() {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::fixed(3, Duration::from_millis(1)).unwrap();
    let executor = Arc::new(RetryExecutor::new(policy).with_async_sleep(Arc::new(sleeper.clone())));

    let tasks: Vec<_> = (0..8)
        .map(|task| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                let calls = Arc::new(AtomicU32::new(0));
                let result = executor
                    .execute_async(|| {
                        let calls = Arc::clone(&calls);
                        async move {
                            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                                Err(TestError::new("timeout", format!("task {task} first try")))
                            } else {
                                Ok(task)
                            }
                        }
                    })
                    .await;
                (result, calls.load(Ordering::SeqCst))
            })
        })
        .collect();

    for (task, handle) in tasks.into_iter().enumerate() {
        let (result, calls) = handle.await.unwrap();
        assert_eq!(result, Ok(task));
        assert_eq!(calls, 2);
    }
    assert_eq!(sleeper.count(), 8);
}

#[tokio::test]
async fn test_async_observer_sees_rendered_errors() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let policy = RetryPolicy::fixed(3, Duration::ZERO).unwrap();
    let (executor, _, _) = recording_executor(policy);
    let executor = executor.with_observer(RetryObserver::asynchronous(move |attempt, error| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push(format!("{attempt}: {error}"));
            Ok(())
        }
    }));
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), TestError> = executor
        .execute_async(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(TestError::new("timeout", format!("attempt {n} timed out"))) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(*seen.lock(), vec!["1: attempt 1 timed out", "2: attempt 2 timed out"]);
}
