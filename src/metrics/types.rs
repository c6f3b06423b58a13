use crate::cache::CacheReport;
use crate::pool::PoolStats;
use crate::provider::ProviderId;
use crate::recovery::{ErrorCode, ResilienceError};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a tracked operation is, who it is for, and how long it may run.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: String,
    pub provider: ProviderId,
    pub cancel: CancellationToken,
    /// Bound on the whole tracked operation, retries and waits included
    pub deadline: Option<Duration>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>, provider: impl Into<ProviderId>) -> Self {
        Self {
            operation: operation.into(),
            provider: provider.into(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    pub code: ErrorCode,
    pub message: String,
    pub user_message: String,
}

impl From<&ResilienceError> for OperationError {
    fn from(error: &ResilienceError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            user_message: error.user_message(),
        }
    }
}

/// Uniform outcome of a tracked operation. Exactly one of `result` and
/// `error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub operation_id: Uuid,
    pub operation: String,
    pub provider: ProviderId,
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<OperationError>,
    pub execution_time_ms: u64,
}

impl<T> OperationResult<T> {
    pub fn into_result(self) -> Result<T, OperationError> {
        match (self.result, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(OperationError {
                code: ErrorCode::Transient,
                message: "operation produced no result".to_string(),
                user_message: "The request did not complete.".to_string(),
            }),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCounters {
    pub requests: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub retry_count: u64,
    pub total_execution_time_ms: u64,
    pub average_response_time_ms: f64,
    /// Percentage of tracked operations that failed
    pub error_rate: f64,
    /// Percentage of cache reads that hit, across every store
    pub cache_hit_rate: f64,
    /// Percentage of live pooled connections handed out, across every pool
    pub pool_utilization: f64,
    pub errors_by_code: BTreeMap<ErrorCode, u64>,
    pub providers: BTreeMap<ProviderId, ProviderCounters>,
}

/// Point-in-time view of the pools, caches and retry counters that the
/// gauge metrics are derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSnapshot {
    pub pools: BTreeMap<String, PoolStats>,
    pub caches: BTreeMap<String, CacheReport>,
    pub retries: u64,
}

impl ResourceSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        let (hits, requests) = self.caches.values().fold((0u64, 0u64), |(h, r), cache| {
            (h + cache.stats.hits, r + cache.stats.total_requests)
        });
        percentage(hits, requests)
    }

    pub fn cache_requests(&self) -> u64 {
        self.caches
            .values()
            .map(|cache| cache.stats.total_requests)
            .sum()
    }

    pub fn pool_utilization(&self) -> f64 {
        let (active, total) = self.pools.values().fold((0usize, 0usize), |(a, t), pool| {
            (a + pool.active, t + pool.total)
        });
        percentage(active as u64, total as u64)
    }
}

pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Limits past which the report suggests tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsThresholds {
    pub slow_response_ms: u64,
    pub min_cache_hit_rate: f64,
    pub max_error_rate: f64,
    pub high_pool_utilization: f64,
}

impl Default for MetricsThresholds {
    fn default() -> Self {
        Self {
            slow_response_ms: 5000,
            min_cache_hit_rate: 50.0,
            max_error_rate: 10.0,
            high_pool_utilization: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    pub connection_pools: BTreeMap<String, PoolStats>,
    pub cache_statistics: BTreeMap<String, CacheReport>,
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize performance report")
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("Failed to write performance report: {}", path.display()))
    }
}
