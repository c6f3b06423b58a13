//! Resilience layer configuration.
//!
//! Loaded once (see [`crate::cli::ConfigDiscovery`]) and consumed by
//! [`crate::ResilienceFacade::new`]. Every section has defaults, so a TOML
//! file only needs the values it changes.

use crate::cache::{CacheKind, CacheStoreConfig, EvictionPolicy};
use crate::metrics::MetricsThresholds;
use crate::pool::PoolConfig;
use crate::provider::ProviderId;
use crate::recovery::{ResilienceError, RetryPolicy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Per-provider settings; providers not listed get [`ProviderSettings::default`]
    pub providers: BTreeMap<String, ProviderSettings>,
    pub pool: PoolSettings,
    pub concurrency: ConcurrencySettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub metrics: MetricsThresholds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub min_pool_size: usize,
    pub max_pool_size: usize,
    /// Classify this provider's failures by HTTP status instead of treating
    /// them all as transient
    pub http_error_mapping: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            min_pool_size: 2,
            max_pool_size: 10,
            http_error_mapping: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub acquire_timeout_ms: u64,
    pub max_connection_age_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 30_000,
            max_connection_age_secs: 30 * 60,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub max_concurrent: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self { max_concurrent: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub audio_ttl_secs: u64,
    pub audio_max_entries: usize,
    pub metadata_ttl_secs: u64,
    pub configuration_ttl_secs: u64,
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            audio_ttl_secs: 2 * 60 * 60,
            audio_max_entries: 100,
            metadata_ttl_secs: 30 * 60,
            configuration_ttl_secs: 15 * 60,
            eviction_policy: EvictionPolicy::InsertionOrder,
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> Result<(), ResilienceError> {
        for (provider, settings) in &self.providers {
            if settings.max_pool_size == 0 {
                return Err(ResilienceError::Config(format!(
                    "providers.{}.max_pool_size must be at least 1",
                    provider
                )));
            }
            if settings.min_pool_size > settings.max_pool_size {
                return Err(ResilienceError::Config(format!(
                    "providers.{}.min_pool_size ({}) exceeds max_pool_size ({})",
                    provider, settings.min_pool_size, settings.max_pool_size
                )));
            }
        }

        if self.concurrency.max_concurrent == 0 {
            return Err(ResilienceError::Config(
                "concurrency.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.cache.audio_max_entries == 0 {
            return Err(ResilienceError::Config(
                "cache.audio_max_entries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn provider_settings(&self, provider: &ProviderId) -> ProviderSettings {
        self.providers
            .get(provider.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn pool_config_for(&self, provider: &ProviderId) -> PoolConfig {
        let settings = self.provider_settings(provider);
        PoolConfig {
            min_size: settings.min_pool_size,
            max_size: settings.max_pool_size,
            max_connection_age: Duration::from_secs(self.pool.max_connection_age_secs),
            acquire_timeout: Duration::from_millis(self.pool.acquire_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    /// Store parameters for one of the three caches. Only the audio store is
    /// size-bounded.
    pub fn cache_config(&self, kind: CacheKind) -> CacheStoreConfig {
        let cache = &self.cache;
        let config = match kind {
            CacheKind::Audio => CacheStoreConfig::new(Duration::from_secs(cache.audio_ttl_secs))
                .with_max_entries(cache.audio_max_entries),
            CacheKind::ProviderMetadata => {
                CacheStoreConfig::new(Duration::from_secs(cache.metadata_ttl_secs))
            }
            CacheKind::Configuration => {
                CacheStoreConfig::new(Duration::from_secs(cache.configuration_ttl_secs))
            }
        };
        config.with_eviction_policy(cache.eviction_policy)
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ResilienceConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Defaults plus an entry for each named provider, for `init-config`.
    pub fn with_providers<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| (provider.into(), ProviderSettings::default()))
                .collect(),
            ..Self::default()
        }
    }
}
