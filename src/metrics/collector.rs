use crate::metrics::types::{
    MetricsThresholds, OperationContext, OperationError, OperationResult, PerformanceMetrics,
    PerformanceReport, ResourceSnapshot, percentage,
};
use crate::recovery::ResilienceError;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Process-lifetime performance counters for tracked operations.
#[derive(Debug)]
pub struct MetricsCollector {
    thresholds: MetricsThresholds,
    metrics: Mutex<PerformanceMetrics>,
}

impl MetricsCollector {
    pub fn new(thresholds: MetricsThresholds) -> Self {
        Self {
            thresholds,
            metrics: Mutex::new(PerformanceMetrics::default()),
        }
    }

    pub fn thresholds(&self) -> &MetricsThresholds {
        &self.thresholds
    }

    /// Run `operation` and record its outcome.
    ///
    /// Never fails: errors, panics, cancellation and an elapsed deadline all
    /// come back as an [`OperationResult`] with `success == false`.
    pub async fn track<T, Fut>(&self, context: &OperationContext, operation: Fut) -> OperationResult<T>
    where
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        let operation_id = Uuid::new_v4();
        let start = Instant::now();

        let guarded = async {
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => Err(ResilienceError::Cancelled),
                outcome = AssertUnwindSafe(operation).catch_unwind() => match outcome {
                    Ok(result) => result,
                    Err(payload) => Err(ResilienceError::OperationPanicked(panic_message(payload))),
                },
            }
        };

        let outcome = match context.deadline {
            Some(deadline) => tokio::time::timeout(deadline, guarded)
                .await
                .unwrap_or(Err(ResilienceError::DeadlineExceeded(deadline))),
            None => guarded.await,
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;

        let (result, error) = match outcome {
            Ok(value) => {
                debug!(
                    operation_id = %operation_id,
                    operation = %context.operation,
                    provider = %context.provider,
                    duration_ms = execution_time_ms,
                    "operation succeeded"
                );
                (Some(value), None)
            }
            Err(error) => {
                warn!(
                    operation_id = %operation_id,
                    operation = %context.operation,
                    provider = %context.provider,
                    duration_ms = execution_time_ms,
                    error_code = %error.code(),
                    "operation failed: {}",
                    error
                );
                (None, Some(OperationError::from(&error)))
            }
        };

        self.record(context, execution_time_ms, error.as_ref()).await;

        OperationResult {
            operation_id,
            operation: context.operation.clone(),
            provider: context.provider.clone(),
            success: error.is_none(),
            result,
            error,
            execution_time_ms,
        }
    }

    async fn record(&self, context: &OperationContext, execution_time_ms: u64, error: Option<&OperationError>) {
        let mut guard = self.metrics.lock().await;
        let metrics = &mut *guard;

        metrics.request_count += 1;
        metrics.total_execution_time_ms += execution_time_ms;
        metrics.average_response_time_ms =
            metrics.total_execution_time_ms as f64 / metrics.request_count as f64;

        let provider = metrics.providers.entry(context.provider.clone()).or_default();
        provider.requests += 1;

        match error {
            Some(error) => {
                provider.errors += 1;
                metrics.error_count += 1;
                *metrics.errors_by_code.entry(error.code).or_insert(0) += 1;
            }
            None => metrics.success_count += 1,
        }

        metrics.error_rate = percentage(metrics.error_count, metrics.request_count);
    }

    /// Refresh the gauge metrics from the current pool and cache state.
    pub async fn update_gauges(&self, snapshot: &ResourceSnapshot) {
        let mut metrics = self.metrics.lock().await;
        metrics.cache_hit_rate = snapshot.cache_hit_rate();
        metrics.pool_utilization = snapshot.pool_utilization();
        metrics.retry_count = snapshot.retries;
    }

    pub async fn metrics(&self) -> PerformanceMetrics {
        self.metrics.lock().await.clone()
    }

    pub async fn report(&self, snapshot: ResourceSnapshot) -> PerformanceReport {
        self.update_gauges(&snapshot).await;
        let metrics = self.metrics().await;
        let recommendations = self.recommendations(&metrics, &snapshot);

        PerformanceReport {
            generated_at: Utc::now(),
            metrics,
            connection_pools: snapshot.pools,
            cache_statistics: snapshot.caches,
            recommendations,
        }
    }

    fn recommendations(&self, metrics: &PerformanceMetrics, snapshot: &ResourceSnapshot) -> Vec<String> {
        let mut recommendations = Vec::new();

        if metrics.request_count > 0
            && metrics.average_response_time_ms > self.thresholds.slow_response_ms as f64
        {
            recommendations.push(format!(
                "Average response time is {:.0}ms (threshold {}ms). Consider raising the concurrency limit or routing to faster providers.",
                metrics.average_response_time_ms, self.thresholds.slow_response_ms
            ));
        }

        if snapshot.cache_requests() > 0 && metrics.cache_hit_rate < self.thresholds.min_cache_hit_rate {
            recommendations.push(format!(
                "Cache hit rate is {:.1}% (threshold {:.1}%). Consider longer cache TTLs or a larger audio cache.",
                metrics.cache_hit_rate, self.thresholds.min_cache_hit_rate
            ));
        }

        if metrics.request_count > 0 && metrics.error_rate > self.thresholds.max_error_rate {
            recommendations.push(format!(
                "Error rate is {:.1}% (threshold {:.1}%). Check provider credentials, quotas and network health.",
                metrics.error_rate, self.thresholds.max_error_rate
            ));
        }

        if metrics.pool_utilization > self.thresholds.high_pool_utilization {
            recommendations.push(format!(
                "Connection pool utilization is {:.1}% (threshold {:.1}%). Consider increasing the maximum pool size.",
                metrics.pool_utilization, self.thresholds.high_pool_utilization
            ));
        }

        recommendations
    }

    pub async fn clear(&self) {
        *self.metrics.lock().await = PerformanceMetrics::default();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsThresholds::default())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
