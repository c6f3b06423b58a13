use crate::provider::ProviderId;
use crate::recovery::types::{ClassifiedError, ErrorCode, ProviderFailure};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type ClassifyFn = Arc<dyn Fn(&ProviderFailure, &ProviderId) -> ClassifiedError + Send + Sync>;

/// Table of per-provider classification functions with a generic default entry.
///
/// Adding a provider mapping is a [`ErrorClassifier::register`] call; providers
/// without an entry fall through to the default, which treats everything as
/// a retryable transient failure.
pub struct ErrorClassifier {
    table: DashMap<ProviderId, ClassifyFn>,
    fallback: ClassifyFn,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::with_fallback(classify_generic)
    }

    pub fn with_fallback<F>(fallback: F) -> Self
    where
        F: Fn(&ProviderFailure, &ProviderId) -> ClassifiedError + Send + Sync + 'static,
    {
        Self {
            table: DashMap::new(),
            fallback: Arc::new(fallback),
        }
    }

    pub fn register<F>(&self, provider: impl Into<ProviderId>, classify: F)
    where
        F: Fn(&ProviderFailure, &ProviderId) -> ClassifiedError + Send + Sync + 'static,
    {
        let provider = provider.into();
        debug!(provider = %provider, "error classifier registered");
        self.table.insert(provider, Arc::new(classify));
    }

    pub fn unregister(&self, provider: &ProviderId) -> bool {
        self.table.remove(provider).is_some()
    }

    pub fn is_registered(&self, provider: &ProviderId) -> bool {
        self.table.contains_key(provider)
    }

    pub fn classify(&self, failure: &ProviderFailure, provider: &ProviderId) -> ClassifiedError {
        // Clone the function out so the shard lock is not held while it runs
        let classify = self
            .table
            .get(provider)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::clone(&self.fallback));
        classify(failure, provider)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<String> = self
            .table
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        providers.sort();
        f.debug_struct("ErrorClassifier")
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}

/// Default entry: every failure is a retryable transient error.
pub fn classify_generic(failure: &ProviderFailure, provider: &ProviderId) -> ClassifiedError {
    ClassifiedError::new(
        ErrorCode::Transient,
        format!(
            "{} is temporarily unavailable ({}). The request will be retried.",
            provider, failure
        ),
        true,
    )
}

/// HTTP status mapping shared by providers speaking plain REST.
pub fn classify_http_status(failure: &ProviderFailure, provider: &ProviderId) -> ClassifiedError {
    match failure {
        ProviderFailure::Http { status: 401, .. } => ClassifiedError::new(
            ErrorCode::AuthenticationFailed,
            format!(
                "Authentication with {} failed. Check the API key or region.",
                provider
            ),
            false,
        ),
        ProviderFailure::Http {
            status: 402 | 403, ..
        } => ClassifiedError::new(
            ErrorCode::QuotaExceeded,
            format!(
                "{} quota exceeded or access denied. Check your subscription.",
                provider
            ),
            false,
        ),
        ProviderFailure::Http {
            status: 400 | 422,
            body,
        } => ClassifiedError::new(
            ErrorCode::BadRequest,
            format!("{} rejected the request: {}", provider, body),
            false,
        ),
        ProviderFailure::Http { status: 429, .. } => ClassifiedError::new(
            ErrorCode::RateLimited,
            format!("{} is rate limiting requests. Retrying shortly.", provider),
            true,
        ),
        ProviderFailure::Http {
            status: 500..=599, ..
        }
        | ProviderFailure::Network(_)
        | ProviderFailure::Timeout(_) => ClassifiedError::new(
            ErrorCode::Transient,
            format!("{} is temporarily unavailable ({}).", provider, failure),
            true,
        ),
        _ => classify_generic(failure, provider),
    }
}
