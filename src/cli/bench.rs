//! Simulated load driver behind `speechrelay bench`.

use crate::cli::args::BenchConfig;
use crate::{
    OperationContext, PerformanceReport, ResilienceConfig, ResilienceFacade, SimulatedProvider,
    SynthesisRequest,
};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Outcome of a bench run.
#[derive(Debug)]
pub struct BenchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub report: PerformanceReport,
}

/// Spread `config.requests` synthesis requests over the simulated providers,
/// all issued at once, then collect the facade's report.
pub async fn run_bench(config: &BenchConfig, mut resilience: ResilienceConfig) -> Result<BenchSummary> {
    if let Some(base_delay_ms) = config.base_delay_ms {
        resilience.retry.base_delay_ms = base_delay_ms;
    }
    anyhow::ensure!(!config.providers.is_empty(), "bench needs at least one provider");

    let facade = Arc::new(
        ResilienceFacade::new(resilience).context("Failed to initialize the resilience layer")?,
    );
    for provider in &config.providers {
        let simulated = SimulatedProvider::new(provider.as_str())
            .with_latency(
                Duration::from_millis(config.min_latency_ms),
                Duration::from_millis(config.max_latency_ms),
            )
            .with_failure_rate(config.failure_rate);
        facade.register_provider(Arc::new(simulated))?;
    }

    info!(
        requests = config.requests,
        providers = config.providers.len(),
        phrases = config.distinct_phrases,
        "starting bench"
    );

    let metadata = config.providers.iter().map(|provider| {
        let facade = facade.clone();
        let context = OperationContext::new("provider_metadata", provider.as_str());
        async move { facade.provider_metadata(&context).await.success }
    });
    join_all(metadata).await;

    let phrases = config.distinct_phrases.max(1);
    let requests = (0..config.requests).map(|i| {
        let facade = facade.clone();
        let provider = config.providers[i % config.providers.len()].clone();
        let request = SynthesisRequest::new(format!("Bench phrase number {}", i % phrases));
        tokio::spawn(async move {
            let context = OperationContext::new("synthesize", provider);
            facade.synthesize(&request, &context).await.success
        })
    });

    let mut succeeded = 0;
    let mut failed = 0;
    for outcome in join_all(requests).await {
        match outcome {
            Ok(true) => succeeded += 1,
            Ok(false) | Err(_) => failed += 1,
        }
    }

    let report = facade.report().await;
    facade.shutdown().await;

    info!(succeeded, failed, "bench finished");
    Ok(BenchSummary {
        succeeded,
        failed,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_bench(requests: usize, failure_rate: f64) -> BenchConfig {
        BenchConfig {
            requests,
            providers: vec!["alpha".to_string(), "beta".to_string()],
            distinct_phrases: 4,
            failure_rate,
            min_latency_ms: 1,
            max_latency_ms: 3,
            base_delay_ms: Some(1),
            ..BenchConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bench_without_failures() {
        let summary = run_bench(&quick_bench(40, 0.0), ResilienceConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 40);
        assert_eq!(summary.failed, 0);
        // 40 synthesize + 2 metadata lookups
        assert_eq!(summary.report.metrics.request_count, 42);
        assert_eq!(summary.report.connection_pools.len(), 2);
        assert!(summary.report.cache_statistics.contains_key("audio"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bench_counts_failures() {
        let mut resilience = ResilienceConfig::default();
        resilience.retry.max_retries = 0;

        let summary = run_bench(&quick_bench(30, 1.0), resilience).await.unwrap();

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 30);
        assert!(summary.report.metrics.error_rate > 99.0);
        assert!(!summary.report.recommendations.is_empty());
    }
}
