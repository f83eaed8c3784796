//! Injectable sleep primitives
//!
//! [`RetryExecutor`](super::RetryExecutor) never calls `std::thread::sleep` or
//! `tokio::time::sleep` directly. It waits through these traits, which lets
//! tests substitute a recorder that returns immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Blocking sleep used between synchronous retry attempts
pub trait Sleep: Send + Sync {
    /// Block the current thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Cooperative sleep used between asynchronous retry attempts
#[async_trait]
pub trait AsyncSleep: Send + Sync {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Blocks with [`std::thread::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Suspends with [`tokio::time::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl AsyncSleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

impl<T: Sleep + ?Sized> Sleep for Arc<T> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[async_trait]
impl<T: AsyncSleep + ?Sized> AsyncSleep for Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}
