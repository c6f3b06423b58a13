use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The three stores the facade keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Audio,
    ProviderMetadata,
    Configuration,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [
        CacheKind::Audio,
        CacheKind::ProviderMetadata,
        CacheKind::Configuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Audio => "audio",
            CacheKind::ProviderMetadata => "provider_metadata",
            CacheKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entries an overflowing write sweeps out first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest by write time
    #[default]
    InsertionOrder,
    /// Least recently read (or written, if never read)
    AccessOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Audio(Arc<Vec<u8>>),
    Json(serde_json::Value),
}

impl CacheValue {
    pub fn as_audio(&self) -> Option<&Arc<Vec<u8>>> {
        match self {
            CacheValue::Audio(audio) => Some(audio),
            CacheValue::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Json(value) => Some(value),
            CacheValue::Audio(_) => None,
        }
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(audio: Vec<u8>) -> Self {
        CacheValue::Audio(Arc::new(audio))
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        CacheValue::Json(value)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub written_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    /// Write and access sequence numbers order entries whose timestamps tie
    pub(crate) write_seq: u64,
    pub(crate) access_seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStoreConfig {
    pub ttl: Duration,
    /// Entry-count bound; `None` leaves the store unbounded
    pub max_entries: Option<usize>,
    pub eviction_policy: EvictionPolicy,
    /// Entries removed by one eviction sweep
    pub eviction_batch: usize,
}

impl CacheStoreConfig {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: None,
            eviction_policy: EvictionPolicy::default(),
            eviction_batch: 10,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_requests: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub entry_count: usize,
    pub stats: CacheStats,
}
