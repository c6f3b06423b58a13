use crate::provider::ProviderId;
use crate::recovery::ResilienceError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Contract every pooled per-provider resource implements.
pub trait PooledResource: Send + Sync + 'static {
    /// Resource-level health check, on top of the pool's age rule
    fn validate(&self) -> bool {
        true
    }

    /// Release whatever the resource holds. Called at most once.
    fn dispose(&mut self) {}
}

/// Creates resources for a pool; called at construction (up to `min_size`)
/// and lazily on acquire.
pub trait ResourceFactory<R>: Send + Sync {
    fn create(&self, provider: &ProviderId) -> Result<R, ResilienceError>;
}

/// A pooled resource plus the bookkeeping the pool needs to recycle it.
///
/// Owned by the pool while idle and by exactly one caller between acquire
/// and release.
#[derive(Debug)]
pub struct Connection<R> {
    id: ConnectionId,
    provider: ProviderId,
    created_at: Instant,
    last_used_at: Instant,
    disposed: bool,
    resource: R,
}

impl<R: PooledResource> Connection<R> {
    pub(crate) fn new(provider: ProviderId, resource: R) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            provider,
            created_at: now,
            last_used_at: now,
            disposed: false,
            resource,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Expiry is by age since creation, not by idle time.
    pub fn is_valid(&self, max_age: Duration) -> bool {
        !self.disposed && self.age() < max_age && self.resource.validate()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    pub(crate) fn dispose(&mut self) {
        if self.disposed {
            warn!(
                provider = %self.provider,
                connection_id = %self.id,
                "connection already disposed"
            );
            return;
        }
        self.resource.dispose();
        self.disposed = true;
    }
}

/// Pooled HTTP client for one provider.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl PooledResource for HttpSession {}

/// Builds [`HttpSession`]s with the configured request timeout.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    request_timeout: Duration,
    user_agent: String,
}

impl HttpSessionFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            user_agent: format!("speechrelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ResourceFactory<HttpSession> for HttpSessionFactory {
    fn create(&self, provider: &ProviderId) -> Result<HttpSession, ResilienceError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| {
                ResilienceError::Config(format!(
                    "failed to build HTTP client for {}: {}",
                    provider, e
                ))
            })?;
        Ok(HttpSession { client })
    }
}
