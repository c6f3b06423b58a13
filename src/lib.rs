//! # speechrelay
//!
//! Resilience and performance layer for applications that dispatch text to
//! several third-party speech-synthesis HTTP APIs. Every provider call is
//! routed through the same machinery: a per-provider connection pool, TTL
//! caches, a process-wide concurrency limit and a classifying retry invoker,
//! with metrics recorded for each operation.
//!
//! ## Architecture Overview
//!
//! - **[`pool`]**: bounded per-provider pools of reusable connections
//! - **[`cache`]**: TTL stores for audio, provider metadata and configuration
//! - **[`limiter`]**: process-wide bound on in-flight provider calls
//! - **[`recovery`]**: failure taxonomy, per-provider classification and retry
//! - **[`metrics`]**: operation tracking and performance reports
//! - **[`integration`]**: the [`ResilienceFacade`] composing all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speechrelay::{OperationContext, ResilienceConfig, ResilienceFacade, SimulatedProvider, SynthesisRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let facade = ResilienceFacade::new(ResilienceConfig::default())?;
//!     facade.register_provider(Arc::new(SimulatedProvider::new("azure")))?;
//!
//!     let result = facade
//!         .synthesize(
//!             &SynthesisRequest::new("Good morning"),
//!             &OperationContext::new("synthesize", "azure"),
//!         )
//!         .await;
//!     println!("success: {}", result.success);
//!     Ok(())
//! }
//! ```

/// Per-provider connection pools.
///
/// Bounded, FIFO-fair, cancellable acquisition of pooled resources with
/// age-based validity.
pub mod pool;

/// TTL caches with switchable eviction policy.
pub mod cache;

/// Process-wide concurrency limit for provider calls.
pub mod limiter;

/// Failure classification and retry with exponential backoff.
///
/// Maps raw provider failures to error codes and user-facing messages through
/// a per-provider table, and retries the retryable ones.
pub mod recovery;

/// Operation tracking, performance metrics and reports.
pub mod metrics;

/// Speech provider collaborator interface and the simulated provider.
pub mod provider;

/// Configuration for every component of the resilience layer.
pub mod config;

/// High-level orchestration behind [`ResilienceFacade`].
pub mod integration;

/// Environment constants and path utilities.
///
/// Centralizes the configuration paths and logging defaults used by the
/// binary.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use cache::{CacheKind, CacheStats, CacheStore, CacheStoreConfig, CacheValue, EvictionPolicy};
pub use config::ResilienceConfig;
pub use integration::{ConnectionLease, ResilienceFacade};
pub use limiter::ConcurrencyLimiter;
pub use metrics::{
    MetricsCollector, MetricsThresholds, OperationContext, OperationResult, PerformanceMetrics,
    PerformanceReport,
};
pub use pool::{Connection, ConnectionPool, HttpSession, PoolConfig, PoolStats};
pub use provider::{AudioFormat, ProviderId, SimulatedProvider, SpeechProvider, SynthesisRequest};
pub use recovery::{
    ErrorClassifier, ErrorCode, ProviderFailure, ResilienceError, RetryInvoker, RetryPolicy,
};
