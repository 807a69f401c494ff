//! Bounded pool of execution slots for blocking native calls.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::panic_message;

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("limiter capacity must be at least 1")]
    ZeroCapacity,
    #[error("limiter is closed")]
    Closed,
    #[error("blocking call panicked: {0}")]
    Panicked(String),
}

/// Counting semaphore around native calls.
///
/// Waiting for a slot is backpressure, never an error, and waiters have no
/// ordering guarantee beyond eventual admission. A slot is returned on every
/// exit path of the body, including panics and a dropped caller future.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(DEFAULT_CAPACITY)),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Result<Self, LimiterError> {
        if capacity == 0 {
            return Err(LimiterError::ZeroCapacity);
        }
        let capacity = capacity
            .min(Semaphore::MAX_PERMITS)
            .min(u32::MAX as usize);
        Ok(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop admitting work. Current holders finish; waiters get `Closed`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Wait until every slot is free, then close.
    ///
    /// Waiters queued ahead of this call are admitted first; anyone arriving
    /// later gets `Closed`. Returns immediately on an already closed limiter.
    pub async fn close_when_idle(&self) {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        if let Ok(held) = self.permits.acquire_many(all).await {
            self.permits.close();
            drop(held);
            debug!(capacity = self.capacity, "limiter closed after draining");
        }
    }

    /// Take a slot, waiting for one to free up.
    pub async fn acquire(&self) -> Result<LimiterSlot, LimiterError> {
        if self.permits.available_permits() == 0 {
            debug!(capacity = self.capacity, "waiting for a limiter slot");
        }
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map(LimiterSlot)
            .map_err(|_| LimiterError::Closed)
    }

    /// Run an async body while holding a slot.
    pub async fn run<F, Fut, R>(&self, f: F) -> Result<R, LimiterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _slot = self.acquire().await?;
        Ok(f().await)
    }

    /// Run a blocking body on Tokio's blocking pool while holding a slot.
    pub async fn run_blocking<F, R>(&self, f: F) -> Result<R, LimiterError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.acquire().await?.run_blocking(f).await
    }
}

/// One taken slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct LimiterSlot(OwnedSemaphorePermit);

impl LimiterSlot {
    /// Run a blocking body on Tokio's blocking pool.
    ///
    /// The slot moves into the blocking task, so it stays taken until the body
    /// returns even if the caller stops waiting.
    pub async fn run_blocking<F, R>(self, f: F) -> Result<R, LimiterError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self.0;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|err| {
            if err.is_panic() {
                LimiterError::Panicked(panic_message(&*err.into_panic()))
            } else {
                LimiterError::Closed
            }
        })
    }
}
