//! # Resilience Facade
//!
//! Composes every subsystem behind the one entry point the application
//! talks to.
//!
//! ## Core Components
//!
//! - **[`ResilienceFacade`]**: owns the per-provider pools, the three caches,
//!   the shared concurrency limiter, the retry invoker and the metrics collector
//! - **[`ResilienceConfig`]**: sizes and timings for all of the above
//!
//! ## Request Flow
//!
//! ```text
//! track ─▶ cache lookup ─▶ acquire connection ─▶ retry ─▶ limiter ─▶ provider call
//!   │                                                                     │
//!   └◀──────── metrics ◀── cache store ◀── release connection ◀───────────┘
//! ```
//!
//! Retry is the outer layer, so a concurrency slot is only held while a call
//! is actually in flight and never during backoff. The connection is held for
//! the whole operation and released even when the deadline or cancellation
//! drops the operation mid-flight.
//!
//! ## Example Usage
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
//!     let request = SynthesisRequest::new("Hello there").with_voice("en-US-AvaNeural");
//!     let result = facade
//!         .synthesize(&request, &OperationContext::new("synthesize", "azure"))
//!         .await;
//!     println!("success: {} in {}ms", result.success, result.execution_time_ms);
//!
//!     println!("{}", facade.report().await.to_json_pretty()?);
//!     facade.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::cache::{CacheKind, CacheStore, CacheValue};
use crate::config::ResilienceConfig;
use crate::limiter::ConcurrencyLimiter;
use crate::metrics::{MetricsCollector, OperationContext, OperationResult, PerformanceReport, ResourceSnapshot};
use crate::pool::{
    Connection, ConnectionId, ConnectionPool, HttpSession, HttpSessionFactory, PoolStats, ResourceFactory,
};
use crate::provider::{ProviderId, SpeechProvider, SynthesisRequest};
use crate::recovery::{
    AttemptError, ErrorClassifier, ProviderFailure, ResilienceError, RetryInvoker, classify_http_status,
};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SessionPool = ConnectionPool<HttpSession>;

/// Single entry point of the resilience layer.
pub struct ResilienceFacade {
    config: ResilienceConfig,
    session_factory: Arc<dyn ResourceFactory<HttpSession>>,
    pools: DashMap<ProviderId, Arc<SessionPool>>,
    providers: DashMap<ProviderId, Arc<dyn SpeechProvider>>,
    audio_cache: CacheStore<CacheValue>,
    metadata_cache: CacheStore<CacheValue>,
    configuration_cache: CacheStore<CacheValue>,
    limiter: ConcurrencyLimiter,
    retry: RetryInvoker,
    metrics: MetricsCollector,
}

/// A pooled connection checked out of one provider's pool.
///
/// Goes back to the pool that handed it out when dropped, so a caller that
/// bails out between acquire and release never shrinks the pool.
#[derive(Debug)]
pub struct ConnectionLease {
    id: ConnectionId,
    provider: ProviderId,
    session: HttpSession,
    pool: Arc<SessionPool>,
    conn: Option<Connection<HttpSession>>,
}

impl ConnectionLease {
    fn new(pool: Arc<SessionPool>, conn: Connection<HttpSession>) -> Self {
        Self {
            id: conn.id(),
            provider: conn.provider().clone(),
            session: conn.resource().clone(),
            pool,
            conn: Some(conn),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Provider whose pool owns this connection
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn session(&self) -> &HttpSession {
        &self.session
    }

    /// Hand the connection back now instead of at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl ResilienceFacade {
    /// Build the facade with a pool for every provider listed in `config`.
    pub fn new(config: ResilienceConfig) -> Result<Self, ResilienceError> {
        let factory = Arc::new(HttpSessionFactory::new(config.request_timeout()));
        Self::with_session_factory(config, factory)
    }

    pub fn with_session_factory(
        config: ResilienceConfig,
        session_factory: Arc<dyn ResourceFactory<HttpSession>>,
    ) -> Result<Self, ResilienceError> {
        config.validate()?;

        let facade = Self {
            audio_cache: CacheStore::new(CacheKind::Audio.as_str(), config.cache_config(CacheKind::Audio)),
            metadata_cache: CacheStore::new(
                CacheKind::ProviderMetadata.as_str(),
                config.cache_config(CacheKind::ProviderMetadata),
            ),
            configuration_cache: CacheStore::new(
                CacheKind::Configuration.as_str(),
                config.cache_config(CacheKind::Configuration),
            ),
            limiter: ConcurrencyLimiter::new(config.concurrency.max_concurrent)?,
            retry: RetryInvoker::new(Arc::new(ErrorClassifier::new())),
            metrics: MetricsCollector::new(config.metrics.clone()),
            pools: DashMap::new(),
            providers: DashMap::new(),
            session_factory,
            config,
        };

        let configured: Vec<ProviderId> = facade.config.providers.keys().map(ProviderId::new).collect();
        for provider in &configured {
            facade.ensure_pool(provider)?;
        }

        info!(
            providers = configured.len(),
            max_concurrent = facade.limiter.capacity(),
            "resilience facade initialized"
        );
        Ok(facade)
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Register the collaborator that performs `provider`'s calls, creating
    /// its pool if the configuration did not already.
    pub fn register_provider(&self, provider: Arc<dyn SpeechProvider>) -> Result<(), ResilienceError> {
        let id = provider.id();
        self.ensure_pool(&id)?;
        self.providers.insert(id.clone(), provider);
        info!(provider = %id, "provider registered");
        Ok(())
    }

    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        self.retry.classifier()
    }

    fn ensure_pool(&self, provider: &ProviderId) -> Result<Arc<SessionPool>, ResilienceError> {
        if let Some(pool) = self.pools.get(provider) {
            return Ok(pool.clone());
        }

        // Built under the entry lock so racing registrations create one pool
        let pool = self
            .pools
            .entry(provider.clone())
            .or_try_insert_with(|| {
                ConnectionPool::new(
                    provider.clone(),
                    self.config.pool_config_for(provider),
                    self.session_factory.clone(),
                )
                .map(Arc::new)
            })?
            .clone();

        let settings = self.config.provider_settings(provider);
        if settings.http_error_mapping && !self.classifier().is_registered(provider) {
            self.classifier().register(provider.clone(), classify_http_status);
        }
        Ok(pool)
    }

    fn pool(&self, provider: &ProviderId) -> Result<Arc<SessionPool>, ResilienceError> {
        self.pools
            .get(provider)
            .map(|pool| pool.clone())
            .ok_or_else(|| ResilienceError::UnknownProvider(provider.clone()))
    }

    /// Check a connection out of `provider`'s pool. The lease returns it to
    /// that pool when released or dropped.
    pub async fn acquire_connection(
        &self,
        provider: &ProviderId,
        cancel: &CancellationToken,
    ) -> Result<ConnectionLease, ResilienceError> {
        let pool = self.pool(provider)?;
        let conn = pool.acquire(cancel).await?;
        Ok(ConnectionLease::new(pool, conn))
    }

    /// Return `lease` to the pool that handed it out, whatever `provider` says.
    pub fn release_connection(&self, provider: &ProviderId, lease: ConnectionLease) {
        if lease.provider() != provider {
            warn!(
                provider = %provider,
                owner = %lease.provider(),
                connection_id = %lease.id(),
                "connection released under the wrong provider, returning it to its own pool"
            );
        }
        lease.release();
    }

    pub fn pool_stats(&self, provider: &ProviderId) -> Option<PoolStats> {
        self.pools.get(provider).map(|pool| pool.stats())
    }

    pub fn cache(&self, kind: CacheKind) -> &CacheStore<CacheValue> {
        match kind {
            CacheKind::Audio => &self.audio_cache,
            CacheKind::ProviderMetadata => &self.metadata_cache,
            CacheKind::Configuration => &self.configuration_cache,
        }
    }

    pub fn cache_get(&self, kind: CacheKind, key: &str) -> Option<CacheValue> {
        self.cache(kind).get(key)
    }

    pub fn cache_set(&self, kind: CacheKind, key: impl Into<String>, value: impl Into<CacheValue>) {
        self.cache(kind).set(key, value.into());
    }

    pub fn available_slots(&self) -> usize {
        self.limiter.available_slots()
    }

    /// Run a provider call on a pooled connection under the limiter, retry and
    /// metrics tracking.
    ///
    /// `operation` is called once per attempt with the leased session.
    pub async fn execute_tracked<T, F, Fut>(&self, context: &OperationContext, operation: F) -> OperationResult<T>
    where
        F: FnMut(HttpSession) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let result = self
            .metrics
            .track(context, self.run_on_connection(context, operation))
            .await;
        self.refresh_gauges().await;
        result
    }

    async fn run_on_connection<T, F, Fut>(&self, context: &OperationContext, mut operation: F) -> Result<T, ResilienceError>
    where
        F: FnMut(HttpSession) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let pool = self.pool(&context.provider)?;
        let lease = ConnectionLease::new(pool.clone(), pool.acquire(&context.cancel).await?);
        let policy = self.config.retry_policy();
        let limiter = &self.limiter;
        let cancel = &context.cancel;
        let provider = &context.provider;

        self.retry
            .invoke(provider, policy, cancel, || {
                let call = operation(lease.session().clone());
                async move {
                    match limiter.run(cancel, call).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(failure)) => Err(AttemptError::Failed(failure)),
                        Err(error) => Err(AttemptError::Abort(error)),
                    }
                }
            })
            .await
    }

    fn speech_provider(&self, provider: &ProviderId) -> Result<Arc<dyn SpeechProvider>, ResilienceError> {
        self.providers
            .get(provider)
            .map(|provider| provider.clone())
            .ok_or_else(|| ResilienceError::UnknownProvider(provider.clone()))
    }

    /// Synthesize `request` with `context.provider`, serving repeats from the
    /// audio cache.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        context: &OperationContext,
    ) -> OperationResult<Arc<Vec<u8>>> {
        let result = self
            .metrics
            .track(context, self.synthesize_cached(request, context))
            .await;
        self.refresh_gauges().await;
        result
    }

    async fn synthesize_cached(
        &self,
        request: &SynthesisRequest,
        context: &OperationContext,
    ) -> Result<Arc<Vec<u8>>, ResilienceError> {
        let key = request.cache_key(&context.provider).to_string();
        if let Some(audio) = self.audio_cache.get(&key).as_ref().and_then(CacheValue::as_audio) {
            return Ok(audio.clone());
        }

        let provider = self.speech_provider(&context.provider)?;
        let provider = &provider;
        let audio = self
            .run_on_connection(context, |session| async move {
                provider.synthesize(&session, request).await
            })
            .await?;

        let audio = Arc::new(audio);
        self.audio_cache.set(key, CacheValue::Audio(audio.clone()));
        debug!(provider = %context.provider, bytes = audio.len(), "synthesized audio cached");
        Ok(audio)
    }

    /// Voice catalogue and capabilities for `context.provider`, served from
    /// the provider-metadata cache while fresh.
    pub async fn provider_metadata(&self, context: &OperationContext) -> OperationResult<serde_json::Value> {
        let result = self
            .metrics
            .track(context, self.provider_metadata_cached(context))
            .await;
        self.refresh_gauges().await;
        result
    }

    async fn provider_metadata_cached(
        &self,
        context: &OperationContext,
    ) -> Result<serde_json::Value, ResilienceError> {
        let key = context.provider.as_str();
        if let Some(metadata) = self.metadata_cache.get(key).as_ref().and_then(CacheValue::as_json) {
            return Ok(metadata.clone());
        }

        let provider = self.speech_provider(&context.provider)?;
        let provider = &provider;
        let metadata = self
            .run_on_connection(context, |session| async move { provider.describe(&session).await })
            .await?;

        self.metadata_cache.set(key, CacheValue::Json(metadata.clone()));
        Ok(metadata)
    }

    async fn snapshot(&self) -> ResourceSnapshot {
        let pools: BTreeMap<String, PoolStats> = self
            .pools
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect();
        let caches = CacheKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.cache(*kind).report()))
            .collect();

        ResourceSnapshot {
            pools,
            caches,
            retries: self.retry.statistics().await.total_retries,
        }
    }

    async fn refresh_gauges(&self) {
        let snapshot = self.snapshot().await;
        self.metrics.update_gauges(&snapshot).await;
    }

    pub async fn report(&self) -> PerformanceReport {
        self.metrics.report(self.snapshot().await).await
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Zero every counter. Cached entries and pooled connections are kept.
    pub async fn reset_metrics(&self) {
        self.metrics.clear().await;
        self.retry.reset_statistics().await;
        for kind in CacheKind::ALL {
            self.cache(kind).reset_stats();
        }
    }

    /// Close every pool and clear every cache. Operations still running fail
    /// with [`ResilienceError::PoolClosed`] the next time they need a
    /// connection.
    pub async fn shutdown(&self) {
        for entry in self.pools.iter() {
            entry.value().close();
        }
        for kind in CacheKind::ALL {
            self.cache(kind).clear();
        }
        info!(pools = self.pools.len(), "resilience facade shut down");
    }
}

impl std::fmt::Debug for ResilienceFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceFacade")
            .field("providers", &self.pools.len())
            .field("max_concurrent", &self.limiter.capacity())
            .finish_non_exhaustive()
    }
}
