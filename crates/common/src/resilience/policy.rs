//! Retry policy: attempt budget, backoff shape, jitter and retry filters
//!
//! A [`RetryPolicy`] is an immutable value. It answers three questions for
//! the executor and for callers that run their own loops:
//!
//! - how long to wait before the next attempt ([`RetryPolicy::calculate_delay`])
//! - whether a failed attempt should be retried ([`RetryPolicy::should_retry`])
//! - whether a response should be retried by status
//!   ([`RetryPolicy::should_retry_response`])
//!
//! Attempts are 1-based everywhere: attempt `1` is the first call, and the
//! delay for attempt `n` is the wait after the `n`-th failure.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{RetryError, RetryResult};
use crate::error::{CommonError, ErrorCategory};
use crate::utils::serde::duration_millis;

/// Default number of attempts, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Lower bound of the jitter multiplier
pub const JITTER_MIN_FACTOR: f64 = 0.75;

/// Upper bound of the jitter multiplier
pub const JITTER_MAX_FACTOR: f64 = 1.25;

/// Shape of the delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base_delay` on every attempt
    Fixed,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * 2^(attempt - 1)`
    #[default]
    Exponential,
    /// `base_delay * fib(attempt)` with `fib(1) = fib(2) = 1`
    Fibonacci,
}

impl BackoffStrategy {
    /// Integer multiplier applied to `base_delay` for a 1-based attempt.
    ///
    /// Returns `None` when the multiplier does not fit in a `u32`; callers
    /// treat that as "saturated" and clamp to the maximum delay.
    fn multiplier(self, attempt: u32) -> Option<u32> {
        match self {
            Self::Fixed => Some(1),
            Self::Linear => Some(attempt),
            Self::Exponential => 2_u32.checked_pow(attempt - 1),
            Self::Fibonacci => fibonacci(attempt),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Fibonacci => "fibonacci",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffStrategy {
    type Err = RetryError;

    fn from_str(s: &str) -> RetryResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            "fibonacci" => Ok(Self::Fibonacci),
            other => Err(RetryError::Parse { what: "backoff strategy", value: other.to_string() }),
        }
    }
}

/// n-th Fibonacci number (1, 1, 2, 3, 5, ...), `None` once it exceeds `u32`
fn fibonacci(n: u32) -> Option<u32> {
    let (mut a, mut b) = (0_u32, 1_u32);
    for _ in 0..n {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(a)
}

/// Anything that carries a numeric status, such as an HTTP response
pub trait ResponseStatus {
    /// Status code of the response
    fn status_code(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

impl<T: ResponseStatus + ?Sized> ResponseStatus for &T {
    fn status_code(&self) -> u16 {
        (**self).status_code()
    }
}

/// Immutable retry configuration
///
/// Construct through [`RetryPolicy::new`], [`RetryPolicy::builder`] or a
/// [`RetryPolicyConfig`]; every path validates that `max_attempts >= 1` and
/// `max_delay >= base_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffStrategy,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    retryable_errors: Option<HashSet<String>>,
    retryable_status_codes: Option<HashSet<u16>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffStrategy::default(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
            retryable_errors: None,
            retryable_status_codes: None,
        }
    }
}

impl RetryPolicy {
    /// Create a validated policy without retry filters
    pub fn new(
        max_attempts: u32,
        backoff: BackoffStrategy,
        base_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> RetryResult<Self> {
        Self::builder()
            .max_attempts(max_attempts)
            .backoff(backoff)
            .base_delay(base_delay)
            .max_delay(max_delay)
            .jitter(jitter)
            .build()
    }

    /// Create a configuration builder
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, jitter: false, ..Self::default() }
    }

    /// Fixed delay between attempts, no jitter
    pub fn fixed(max_attempts: u32, delay: Duration) -> RetryResult<Self> {
        Self::new(max_attempts, BackoffStrategy::Fixed, delay, delay, false)
    }

    /// Exponential backoff capped at `max_delay`, with jitter
    pub fn exponential(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> RetryResult<Self> {
        Self::new(max_attempts, BackoffStrategy::Exponential, base_delay, max_delay, true)
    }

    fn validate(&self) -> RetryResult<()> {
        if self.max_attempts < 1 {
            return Err(RetryError::invalid(format!(
                "max_attempts must be at least 1, got {}",
                self.max_attempts
            )));
        }

        if self.max_delay < self.base_delay {
            return Err(RetryError::invalid(format!(
                "max_delay ({:?}) cannot be less than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }

        Ok(())
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay growth shape
    pub fn backoff(&self) -> BackoffStrategy {
        self.backoff
    }

    /// Delay unit the backoff shape is applied to
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap applied before jitter
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Whether delays are randomized by ±25%
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Error categories that may be retried, `None` for all
    pub fn retryable_errors(&self) -> Option<&HashSet<String>> {
        self.retryable_errors.as_ref()
    }

    /// Status codes that may be retried, `None` for none
    pub fn retryable_status_codes(&self) -> Option<&HashSet<u16>> {
        self.retryable_status_codes.as_ref()
    }

    /// Delay before the next attempt after attempt `attempt` failed, without
    /// jitter. Always within `[0, max_delay]`.
    pub fn calculate_base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        self.backoff
            .multiplier(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before the next attempt after attempt `attempt` failed
    ///
    /// With jitter enabled the capped delay is multiplied by a uniform factor
    /// in `[0.75, 1.25]`, so the result may exceed `max_delay` by up to 25%.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.calculate_base_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        // Timing jitter only; thread_rng is not used for anything sensitive.
        let factor = rand::thread_rng().gen_range(JITTER_MIN_FACTOR..=JITTER_MAX_FACTOR);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
    }

    /// Whether `error`, raised by attempt `attempt`, should be retried
    ///
    /// Returns `false` once `attempt >= max_attempts`. Otherwise, with an
    /// error allow-list configured only listed categories are retried;
    /// without one every error is.
    pub fn should_retry<E: ErrorCategory + ?Sized>(&self, error: &E, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        match &self.retryable_errors {
            Some(categories) => categories.contains(error.category()),
            None => true,
        }
    }

    /// Whether `response`, returned by attempt `attempt`, should be retried
    ///
    /// Status-based retries are opt-in: without configured status codes
    /// nothing is retried.
    pub fn should_retry_response<R: ResponseStatus + ?Sized>(
        &self,
        response: &R,
        attempt: u32,
    ) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        match &self.retryable_status_codes {
            Some(codes) => codes.contains(&response.status_code()),
            None => false,
        }
    }

    /// Serializable form of this policy
    pub fn to_config(&self) -> RetryPolicyConfig {
        let mut retryable_errors: Option<Vec<String>> =
            self.retryable_errors.as_ref().map(|set| set.iter().cloned().collect());
        if let Some(list) = retryable_errors.as_mut() {
            list.sort();
        }
        let mut retryable_status_codes: Option<Vec<u16>> =
            self.retryable_status_codes.as_ref().map(|set| set.iter().copied().collect());
        if let Some(list) = retryable_status_codes.as_mut() {
            list.sort_unstable();
        }

        RetryPolicyConfig {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
            retryable_errors,
            retryable_status_codes,
        }
    }
}

/// Builder for RetryPolicy with fluent API
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    /// Start from the defaults: 3 attempts, exponential backoff from 1s
    /// capped at 60s, jitter on, no retry filters
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    /// Set total attempts including the first (must be at least 1)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Set the backoff strategy
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    /// Set the maximum delay (must not be below the base delay)
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.policy.jitter = enabled;
        self
    }

    /// Disable jitter
    pub fn no_jitter(self) -> Self {
        self.jitter(false)
    }

    /// Restrict retries to errors whose [`ErrorCategory`] is listed
    pub fn retryable_errors<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.retryable_errors = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Retry every error (the default)
    pub fn retry_any_error(mut self) -> Self {
        self.policy.retryable_errors = None;
        self
    }

    /// Enable status-based retries for the listed codes
    pub fn retryable_status_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.policy.retryable_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Validate and build the policy
    ///
    /// # Errors
    ///
    /// [`RetryError::InvalidConfiguration`] when `max_attempts` is zero or
    /// `max_delay` is below `base_delay`.
    pub fn build(self) -> RetryResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Serializable retry settings, as found in TOML configuration files
///
/// ```toml
/// max_attempts = 5
/// backoff = "fibonacci"
/// base_delay_ms = 200
/// max_delay_ms = 10000
/// jitter = false
/// retryable_errors = ["timeout", "io::connection_reset"]
/// retryable_status_codes = [429, 503]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    #[serde(rename = "base_delay_ms", with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_millis")]
    pub max_delay: Duration,
    pub jitter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable_errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable_status_codes: Option<Vec<u16>>,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        RetryPolicy::default().to_config()
    }
}

impl RetryPolicyConfig {
    /// Parse settings from a TOML document
    pub fn from_toml_str(source: &str) -> RetryResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse settings from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> RetryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| {
            CommonError::persistence_op(format!("read {}", path.display()), err.to_string())
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate and convert into a policy
    pub fn into_policy(self) -> RetryResult<RetryPolicy> {
        RetryPolicy::try_from(self)
    }
}

impl TryFrom<RetryPolicyConfig> for RetryPolicy {
    type Error = RetryError;

    fn try_from(config: RetryPolicyConfig) -> RetryResult<Self> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(config.max_attempts)
            .backoff(config.backoff)
            .base_delay(config.base_delay)
            .max_delay(config.max_delay)
            .jitter(config.jitter);
        if let Some(categories) = config.retryable_errors {
            builder = builder.retryable_errors(categories);
        }
        if let Some(codes) = config.retryable_status_codes {
            builder = builder.retryable_status_codes(codes);
        }
        builder.build()
    }
}
