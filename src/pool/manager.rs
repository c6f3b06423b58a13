use crate::pool::connection::{Connection, ConnectionId, PooledResource, ResourceFactory};
use crate::provider::ProviderId;
use crate::recovery::ResilienceError;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sizing and lifetime limits for one provider's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    /// Connections older than this are never reused
    pub max_connection_age: Duration,
    /// Upper bound on how long `acquire` waits for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            max_connection_age: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub available: usize,
    pub max: usize,
    pub min: usize,
}

impl PoolStats {
    /// Share of live connections currently handed out, as a percentage
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.active as f64 / self.total as f64 * 100.0
        }
    }
}

struct PoolState<R> {
    available: VecDeque<Connection<R>>,
    active: HashSet<ConnectionId>,
    current_size: usize,
    closed: bool,
}

/// Bounded set of reusable connections for a single provider.
///
/// `max_size` permits on a FIFO semaphore gate `acquire`, so at most
/// `max_size` connections are ever handed out at once and waiters are served
/// in arrival order. The state lock is never held across an await.
pub struct ConnectionPool<R> {
    provider: ProviderId,
    config: PoolConfig,
    factory: Arc<dyn ResourceFactory<R>>,
    state: Mutex<PoolState<R>>,
    permits: Semaphore,
}

impl<R: PooledResource> ConnectionPool<R> {
    /// Create the pool with `min_size` connections already available.
    pub fn new(
        provider: ProviderId,
        config: PoolConfig,
        factory: Arc<dyn ResourceFactory<R>>,
    ) -> Result<Self, ResilienceError> {
        if config.max_size == 0 {
            return Err(ResilienceError::Config(format!(
                "max pool size for {} must be at least 1",
                provider
            )));
        }
        if config.min_size > config.max_size {
            return Err(ResilienceError::Config(format!(
                "min pool size {} exceeds max pool size {} for {}",
                config.min_size, config.max_size, provider
            )));
        }

        let mut available = VecDeque::with_capacity(config.max_size);
        for _ in 0..config.min_size {
            available.push_back(Connection::new(provider.clone(), factory.create(&provider)?));
        }

        info!(
            provider = %provider,
            min = config.min_size,
            max = config.max_size,
            "connection pool created"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                current_size: available.len(),
                available,
                active: HashSet::new(),
                closed: false,
            }),
            permits: Semaphore::new(config.max_size),
            provider,
            config,
            factory,
        })
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Hand out an idle connection or create one.
    ///
    /// Waits (in FIFO order) while `max_size` connections are out, for at
    /// most `acquire_timeout`. Idle connections that fail [`Self::is_valid`]
    /// are disposed and replaced.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Connection<R>, ResilienceError> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
            acquired = tokio::time::timeout(self.config.acquire_timeout, self.permits.acquire()) => {
                match acquired {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return Err(ResilienceError::PoolClosed(self.provider.clone())),
                    Err(_) => {
                        warn!(
                            provider = %self.provider,
                            waited_ms = self.config.acquire_timeout.as_millis() as u64,
                            "timed out waiting for a pooled connection"
                        );
                        return Err(ResilienceError::PoolAcquireTimeout {
                            provider: self.provider.clone(),
                            waited: self.config.acquire_timeout,
                        });
                    }
                }
            }
        };

        let mut state = self.lock_state();
        if state.closed {
            return Err(ResilienceError::PoolClosed(self.provider.clone()));
        }

        while let Some(mut conn) = state.available.pop_front() {
            if self.is_valid(&conn) {
                conn.touch();
                state.active.insert(conn.id());
                permit.forget();
                debug!(
                    provider = %self.provider,
                    connection_id = %conn.id(),
                    "connection acquired (reused)"
                );
                return Ok(conn);
            }

            debug!(
                provider = %self.provider,
                connection_id = %conn.id(),
                age_secs = conn.age().as_secs(),
                "disposing expired idle connection"
            );
            conn.dispose();
            state.current_size = state.current_size.saturating_sub(1);
        }

        // Holding a permit means fewer than max_size are active, and the idle
        // queue is empty, so there is room for one more.
        debug_assert!(state.current_size < self.config.max_size);
        let resource = self.factory.create(&self.provider)?;
        let conn = Connection::new(self.provider.clone(), resource);
        state.current_size += 1;
        state.active.insert(conn.id());
        permit.forget();

        debug!(
            provider = %self.provider,
            connection_id = %conn.id(),
            total = state.current_size,
            "connection acquired (created)"
        );
        Ok(conn)
    }

    /// Return a connection handed out by [`Self::acquire`].
    ///
    /// Valid connections go back to the idle queue; invalid ones are disposed
    /// and no longer count towards the pool size. A connection this pool does
    /// not consider active is disposed without touching the pool.
    pub fn release(&self, mut conn: Connection<R>) {
        let mut state = self.lock_state();

        if !state.active.remove(&conn.id()) {
            drop(state);
            warn!(
                provider = %self.provider,
                connection_id = %conn.id(),
                "released connection is not active in this pool, disposing it"
            );
            if !conn.is_disposed() {
                conn.dispose();
            }
            return;
        }

        if !state.closed && self.is_valid(&conn) && state.available.len() < self.config.max_size {
            conn.touch();
            debug!(
                provider = %self.provider,
                connection_id = %conn.id(),
                "connection released"
            );
            state.available.push_back(conn);
        } else {
            debug!(
                provider = %self.provider,
                connection_id = %conn.id(),
                closed = state.closed,
                "connection disposed on release"
            );
            conn.dispose();
            state.current_size = state.current_size.saturating_sub(1);
        }
        drop(state);

        self.permits.add_permits(1);
    }

    pub fn is_valid(&self, conn: &Connection<R>) -> bool {
        conn.is_valid(self.config.max_connection_age)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            total: state.current_size,
            active: state.active.len(),
            available: state.available.len(),
            max: self.config.max_size,
            min: self.config.min_size,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Dispose idle connections and fail current and future waiters with
    /// [`ResilienceError::PoolClosed`]. Connections still out are disposed
    /// when released.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        self.permits.close();

        let drained = state.available.len();
        for mut conn in state.available.drain(..) {
            conn.dispose();
        }
        state.current_size = state.current_size.saturating_sub(drained);

        info!(
            provider = %self.provider,
            disposed = drained,
            still_active = state.active.len(),
            "connection pool closed"
        );
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState<R>> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R> std::fmt::Debug for ConnectionPool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("provider", &self.provider)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
