//! Panic capture helpers
//!
//! User-supplied callbacks (factories, cleanups, retry observers) run inside
//! loops that must keep going when one callback fails. These helpers turn a
//! panic into a [`PanicError`] so that callers can treat it like any other
//! failure.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use thiserror::Error;

/// A panic converted into an error value
#[derive(Debug, Clone, Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    /// Panic payload rendered as text
    pub message: String,
}

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Run `f`, converting a panic into `Err(PanicError)`
pub fn catch_panic<F, T>(f: F) -> Result<T, PanicError>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(PanicError::from_payload)
}

/// Await `future`, converting a panic into `Err(PanicError)`
pub async fn catch_panic_async<Fut>(future: Fut) -> Result<Fut::Output, PanicError>
where
    Fut: Future,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(PanicError::from_payload)
}
