use crate::cache::types::{CacheEntry, CacheReport, CacheStats, CacheStoreConfig, EvictionPolicy};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::debug;

/// TTL-bounded keyed store.
///
/// Expired entries are dropped lazily by the read that finds them. When an
/// entry-count bound is set, a write of a new key into a full store first
/// sweeps out `eviction_batch` entries chosen by the eviction policy. The
/// bound also holds under concurrent writers of new keys.
#[derive(Debug)]
pub struct CacheStore<V> {
    name: String,
    config: CacheStoreConfig,
    entries: DashMap<String, CacheEntry<V>>,
    sequence: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    total_requests: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(name: impl Into<String>, config: CacheStoreConfig) -> Self {
        Self {
            name: name.into(),
            config,
            entries: DashMap::new(),
            sequence: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(store = %self.name, key, "cache miss");
                return None;
            };

            if now.duration_since(entry.written_at) < self.config.ttl {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                entry.access_seq = self.next_seq();
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(store = %self.name, key, access_count = entry.access_count, "cache hit");
                return Some(entry.value.clone());
            }
        }

        // Re-check under the removal lock, a concurrent write may have refreshed it
        let ttl = self.config.ttl;
        if self
            .entries
            .remove_if(key, |_, entry| now.duration_since(entry.written_at) >= ttl)
            .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(store = %self.name, key, "cache entry expired");
        None
    }

    /// Insert or overwrite `key`. Last write wins.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(max_entries) = self.config.max_entries
            && !self.entries.contains_key(&key)
            && self.entries.len() >= max_entries
        {
            self.evict_batch();
        }

        let now = Instant::now();
        let seq = self.next_seq();
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                written_at: now,
                last_accessed_at: now,
                access_count: 0,
                write_seq: seq,
                access_seq: seq,
            },
        );

        // Concurrent writers can all pass the check above, sweep the overshoot
        if let Some(max_entries) = self.config.max_entries {
            while self.entries.len() > max_entries {
                self.evict_batch();
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every expired entry now instead of waiting for a read to find it.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.written_at) < ttl);
        let purged = before.saturating_sub(self.entries.len());

        if purged > 0 {
            self.expirations.fetch_add(purged as u64, Ordering::Relaxed);
            debug!(store = %self.name, purged, "expired cache entries purged");
        }
        purged
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
        }
    }

    pub fn report(&self) -> CacheReport {
        CacheReport {
            entry_count: self.len(),
            stats: self.stats(),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
    }

    fn evict_batch(&self) {
        let mut candidates: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| {
                let order = match self.config.eviction_policy {
                    EvictionPolicy::InsertionOrder => entry.write_seq,
                    EvictionPolicy::AccessOrder => entry.access_seq,
                };
                (order, entry.key().clone())
            })
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0u64;
        for (_, key) in candidates.into_iter().take(self.config.eviction_batch.max(1)) {
            // A concurrent remove may have beaten us to it
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        debug!(
            store = %self.name,
            evicted,
            policy = ?self.config.eviction_policy,
            "cache eviction sweep"
        );
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}
