use crate::provider::ProviderId;
use crate::recovery::classifier::ErrorClassifier;
use crate::recovery::types::{ErrorCode, ProviderFailure, ResilienceError, RetryPolicy};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Failure of a single attempt.
///
/// `Failed` goes through classification and may be retried; `Abort` carries a
/// failure of the surrounding machinery (cancellation, a closed pool, ...) and
/// propagates immediately.
#[derive(Debug)]
pub enum AttemptError {
    Failed(ProviderFailure),
    Abort(ResilienceError),
}

impl From<ProviderFailure> for AttemptError {
    fn from(failure: ProviderFailure) -> Self {
        AttemptError::Failed(failure)
    }
}

impl From<ResilienceError> for AttemptError {
    fn from(error: ResilienceError) -> Self {
        AttemptError::Abort(error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryStatistics {
    pub total_invocations: u64,
    pub total_attempts: u64,
    pub total_retries: u64,
    pub total_failures: u64,
    pub error_types: HashMap<ErrorCode, u64>,
}

/// Runs a unit of work with bounded exponential backoff.
#[derive(Debug)]
pub struct RetryInvoker {
    classifier: Arc<ErrorClassifier>,
    stats: Mutex<RetryStatistics>,
}

impl RetryInvoker {
    pub fn new(classifier: Arc<ErrorClassifier>) -> Self {
        Self {
            classifier,
            stats: Mutex::new(RetryStatistics::default()),
        }
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.classifier
    }

    /// Invoke `operation` until it succeeds, fails with a non-retryable
    /// class, or `policy.max_retries` retries are used up.
    ///
    /// Sleeps `base_delay × 2^(attempt-1)` between attempts. The sleep aborts
    /// with [`ResilienceError::Cancelled`] as soon as `cancel` fires.
    pub async fn invoke<T, E, F, Fut>(
        &self,
        provider: &ProviderId,
        policy: RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<AttemptError>,
    {
        self.stats.lock().await.total_invocations += 1;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }

            attempt += 1;
            self.record_attempt(attempt).await;

            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(provider = %provider, attempt, "provider call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(error) => match error.into() {
                    AttemptError::Abort(error) => return Err(error),
                    AttemptError::Failed(failure) => failure,
                },
            };

            let classified = self.classifier.classify(&failure, provider);
            self.record_failure(classified.code).await;

            if !classified.retryable || attempt > policy.max_retries {
                warn!(
                    provider = %provider,
                    attempt,
                    error_code = %classified.code,
                    retryable = classified.retryable,
                    "provider call failed: {}",
                    failure
                );
                return Err(ResilienceError::Provider {
                    provider: provider.clone(),
                    code: classified.code,
                    message: classified.user_message,
                    attempts: attempt,
                });
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                provider = %provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error_code = %classified.code,
                "retrying provider call: {}",
                failure
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn record_attempt(&self, attempt: u32) {
        let mut stats = self.stats.lock().await;
        stats.total_attempts += 1;
        if attempt > 1 {
            stats.total_retries += 1;
        }
    }

    async fn record_failure(&self, code: ErrorCode) {
        let mut stats = self.stats.lock().await;
        stats.total_failures += 1;
        *stats.error_types.entry(code).or_insert(0) += 1;
    }

    pub async fn statistics(&self) -> RetryStatistics {
        self.stats.lock().await.clone()
    }

    pub async fn reset_statistics(&self) {
        *self.stats.lock().await = RetryStatistics::default();
    }
}
