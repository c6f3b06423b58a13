//! Process-wide bound on simultaneously in-flight provider calls.

use crate::recovery::ResilienceError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Result<Self, ResilienceError> {
        if capacity == 0 {
            return Err(ResilienceError::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Run `operation` once a slot is free.
    ///
    /// The slot is held by a permit guard, so it is returned on success, on
    /// error, on panic and when the future is dropped. Cancelling `cancel`
    /// while waiting or while `operation` runs yields
    /// [`ResilienceError::Cancelled`].
    pub async fn run<F, T>(&self, cancel: &CancellationToken, operation: F) -> Result<T, ResilienceError>
    where
        F: Future<Output = T>,
    {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            permit = self.semaphore.acquire() => {
                // The semaphore is never closed, a closed one means we are tearing down
                permit.map_err(|_| ResilienceError::Cancelled)?
            }
        };
        trace!(in_flight = self.in_flight(), "concurrency slot acquired");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResilienceError::Cancelled),
            output = operation => Ok(output),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.semaphore.available_permits())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
