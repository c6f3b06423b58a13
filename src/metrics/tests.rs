use super::*;
use crate::cache::{CacheReport, CacheStats};
use crate::pool::PoolStats;
use crate::provider::ProviderId;
use crate::recovery::{ErrorCode, ResilienceError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn context(provider: &str) -> OperationContext {
    OperationContext::new("synthesize", provider)
}

fn provider_error(code: ErrorCode) -> ResilienceError {
    ResilienceError::Provider {
        provider: ProviderId::new("azure"),
        code,
        message: "boom".to_string(),
        attempts: 1,
    }
}

async fn explode() -> Result<u32, ResilienceError> {
    panic!("provider module bug")
}

#[tokio::test(start_paused = true)]
async fn test_track_success() {
    let collector = MetricsCollector::default();

    let result = collector
        .track(&context("azure"), async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            Ok::<_, ResilienceError>(42u32)
        })
        .await;

    assert!(result.success);
    assert_eq!(result.result, Some(42));
    assert!(result.error.is_none());
    assert_eq!(result.execution_time_ms, 120);
    assert_eq!(result.provider, ProviderId::new("azure"));

    let metrics = collector.metrics().await;
    assert_eq!(metrics.request_count, 1);
    assert_eq!(metrics.success_count, 1);
    assert_eq!(metrics.error_count, 0);
    assert_eq!(metrics.average_response_time_ms, 120.0);
}

#[tokio::test]
async fn test_track_failure_carries_classified_error() {
    let collector = MetricsCollector::default();

    let result = collector
        .track(&context("azure"), async {
            Err::<u32, _>(provider_error(ErrorCode::AuthenticationFailed))
        })
        .await;

    assert!(!result.success);
    assert!(result.result.is_none());
    let error = result.error.clone().unwrap();
    assert_eq!(error.code, ErrorCode::AuthenticationFailed);
    assert_eq!(error.user_message, "boom");
    assert_eq!(result.into_result().unwrap_err().code, ErrorCode::AuthenticationFailed);

    let metrics = collector.metrics().await;
    assert_eq!(metrics.error_count, 1);
    assert_eq!(metrics.errors_by_code.get(&ErrorCode::AuthenticationFailed), Some(&1));
    assert_eq!(metrics.error_rate, 100.0);
}

#[tokio::test]
async fn test_track_never_propagates_panic() {
    let collector = MetricsCollector::default();

    let result = collector.track(&context("azure"), explode()).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.code, ErrorCode::Panicked);
    assert!(error.message.contains("provider module bug"));
    assert_eq!(collector.metrics().await.error_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_track_deadline() {
    let collector = MetricsCollector::default();
    let ctx = context("azure").with_deadline(Duration::from_millis(500));

    let result = collector
        .track(&ctx, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ResilienceError>(())
        })
        .await;

    assert_eq!(result.error_code(), Some(ErrorCode::DeadlineExceeded));
    assert_eq!(result.execution_time_ms, 500);
}

#[tokio::test(start_paused = true)]
async fn test_track_cancellation() {
    let collector = MetricsCollector::default();
    let cancel = CancellationToken::new();
    let ctx = context("azure").with_cancel(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = collector
        .track(&ctx, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ResilienceError>(())
        })
        .await;
    trigger.await.unwrap();

    assert_eq!(result.error_code(), Some(ErrorCode::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_cumulative_average_and_error_rate() {
    let collector = MetricsCollector::default();

    for (millis, fail) in [(100, false), (200, true), (300, false), (400, false)] {
        collector
            .track(&context(if fail { "polly" } else { "azure" }), async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                if fail {
                    Err(provider_error(ErrorCode::RateLimited))
                } else {
                    Ok(())
                }
            })
            .await;
    }

    let metrics = collector.metrics().await;
    assert_eq!(metrics.request_count, 4);
    assert_eq!(metrics.total_execution_time_ms, 1000);
    assert_eq!(metrics.average_response_time_ms, 250.0);
    assert_eq!(metrics.error_rate, 25.0);
    assert_eq!(metrics.providers[&ProviderId::new("azure")].requests, 3);
    assert_eq!(metrics.providers[&ProviderId::new("polly")].errors, 1);
}

#[tokio::test]
async fn test_concurrent_tracking_loses_no_updates() {
    let collector = std::sync::Arc::new(MetricsCollector::default());

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let collector = collector.clone();
            tokio::spawn(async move {
                collector
                    .track(&context("azure"), async move {
                        tokio::task::yield_now().await;
                        if i % 5 == 0 {
                            Err(provider_error(ErrorCode::Transient))
                        } else {
                            Ok(i)
                        }
                    })
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let metrics = collector.metrics().await;
    assert_eq!(metrics.request_count, 50);
    assert_eq!(metrics.error_count, 10);
    assert_eq!(metrics.success_count, 40);
}

fn snapshot(hits: &[(u64, u64)], pools: &[(usize, usize)]) -> ResourceSnapshot {
    let mut snapshot = ResourceSnapshot::default();
    for (i, (hits, total)) in hits.iter().enumerate() {
        snapshot.caches.insert(
            format!("store-{i}"),
            CacheReport {
                entry_count: 1,
                stats: CacheStats {
                    hits: *hits,
                    misses: total - hits,
                    total_requests: *total,
                    ..CacheStats::default()
                },
            },
        );
    }
    for (i, (active, total)) in pools.iter().enumerate() {
        snapshot.pools.insert(
            format!("provider-{i}"),
            PoolStats {
                total: *total,
                active: *active,
                available: total - active,
                max: 10,
                min: 2,
            },
        );
    }
    snapshot
}

#[test]
fn test_snapshot_gauges_aggregate_across_resources() {
    let snapshot = snapshot(&[(3, 4), (1, 6), (0, 0)], &[(1, 4), (3, 4)]);

    assert!((snapshot.cache_hit_rate() - 40.0).abs() < 1e-9);
    assert!((snapshot.pool_utilization() - 50.0).abs() < 1e-9);

    let empty = ResourceSnapshot::default();
    assert_eq!(empty.cache_hit_rate(), 0.0);
    assert_eq!(empty.pool_utilization(), 0.0);
}

#[tokio::test]
async fn test_report_without_problems_has_no_recommendations() {
    let collector = MetricsCollector::default();
    collector
        .track(&context("azure"), async { Ok::<_, ResilienceError>(()) })
        .await;

    let report = collector.report(snapshot(&[(9, 10)], &[(1, 4)])).await;

    assert!(report.recommendations.is_empty());
    assert_eq!(report.metrics.cache_hit_rate, 90.0);
    assert_eq!(report.metrics.pool_utilization, 25.0);
}

#[tokio::test(start_paused = true)]
async fn test_report_recommendations_follow_thresholds() {
    let collector = MetricsCollector::new(MetricsThresholds {
        slow_response_ms: 1000,
        ..MetricsThresholds::default()
    });
    collector
        .track(&context("azure"), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Err::<(), _>(provider_error(ErrorCode::Transient))
        })
        .await;

    let report = collector.report(snapshot(&[(1, 10)], &[(9, 10)])).await;

    assert_eq!(report.recommendations.len(), 4);
    assert!(report.recommendations[0].contains("response time"));
    assert!(report.recommendations[1].contains("Cache hit rate"));
    assert!(report.recommendations[2].contains("Error rate"));
    assert!(report.recommendations[3].contains("pool utilization"));
}

#[tokio::test]
async fn test_report_document_shape() {
    let collector = MetricsCollector::default();
    let mut snap = snapshot(&[(1, 2)], &[(0, 2)]);
    snap.retries = 3;

    let report = collector.report(snap).await;
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["generatedAt"].is_string());
    assert_eq!(json["metrics"]["retryCount"], 3);
    assert_eq!(json["metrics"]["cacheHitRate"], 50.0);
    assert_eq!(json["connectionPools"]["provider-0"]["total"], 2);
    assert_eq!(json["cacheStatistics"]["store-0"]["entryCount"], 1);
    assert!(json["recommendations"].is_array());
}

#[tokio::test]
async fn test_save_json_and_clear() {
    let collector = MetricsCollector::default();
    collector
        .track(&context("azure"), async { Ok::<_, ResilienceError>(()) })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("performance.json");
    collector
        .report(ResourceSnapshot::default())
        .await
        .save_json(&path)
        .unwrap();

    let saved: PerformanceReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.metrics.request_count, 1);

    collector.clear().await;
    assert_eq!(collector.metrics().await, PerformanceMetrics::default());
}
