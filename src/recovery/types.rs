use crate::provider::ProviderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Taxonomy code attached to every failure leaving the resilience layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Transient,
    RateLimited,
    AuthenticationFailed,
    QuotaExceeded,
    BadRequest,
    PoolAcquireTimeout,
    PoolClosed,
    UnknownProvider,
    Cancelled,
    DeadlineExceeded,
    Panicked,
    Configuration,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Transient => "transient",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::AuthenticationFailed => "authentication_failed",
            ErrorCode::QuotaExceeded => "quota_exceeded",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::PoolAcquireTimeout => "pool_acquire_timeout",
            ErrorCode::PoolClosed => "pool_closed",
            ErrorCode::UnknownProvider => "unknown_provider",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::Panicked => "panicked",
            ErrorCode::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure reported by a provider call before classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderFailure {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl ProviderFailure {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        ProviderFailure::Http {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderFailure::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderFailure {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderFailure::Timeout(error.to_string())
        } else if let Some(status) = error.status() {
            ProviderFailure::http(status.as_u16(), error.to_string())
        } else if error.is_connect() || error.is_request() {
            ProviderFailure::Network(error.to_string())
        } else {
            ProviderFailure::Other(error.to_string())
        }
    }
}

/// Outcome of running a [`ProviderFailure`] through the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub user_message: String,
    pub retryable: bool,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, user_message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            user_message: user_message.into(),
            retryable,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResilienceError {
    #[error("{provider}: {message} ({code}, after {attempts} attempt(s))")]
    Provider {
        provider: ProviderId,
        code: ErrorCode,
        message: String,
        attempts: u32,
    },
    #[error("Timed out after {waited:?} waiting for a {provider} connection")]
    PoolAcquireTimeout { provider: ProviderId, waited: Duration },
    #[error("Connection pool for {0} is closed")]
    PoolClosed(ProviderId),
    #[error("Provider not registered: {0}")]
    UnknownProvider(ProviderId),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Operation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
    #[error("Operation panicked: {0}")]
    OperationPanicked(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ResilienceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResilienceError::Provider { code, .. } => *code,
            ResilienceError::PoolAcquireTimeout { .. } => ErrorCode::PoolAcquireTimeout,
            ResilienceError::PoolClosed(_) => ErrorCode::PoolClosed,
            ResilienceError::UnknownProvider(_) => ErrorCode::UnknownProvider,
            ResilienceError::Cancelled => ErrorCode::Cancelled,
            ResilienceError::DeadlineExceeded(_) => ErrorCode::DeadlineExceeded,
            ResilienceError::OperationPanicked(_) => ErrorCode::Panicked,
            ResilienceError::Config(_) => ErrorCode::Configuration,
        }
    }

    /// Message suitable for showing next to the failed item in the UI.
    pub fn user_message(&self) -> String {
        match self {
            ResilienceError::Provider { message, .. } => message.clone(),
            ResilienceError::PoolAcquireTimeout { provider, .. } => format!(
                "{} is busy right now. Please try again in a moment.",
                provider
            ),
            ResilienceError::PoolClosed(provider) => {
                format!("{} is shutting down.", provider)
            }
            ResilienceError::UnknownProvider(provider) => {
                format!("{} is not configured.", provider)
            }
            ResilienceError::Cancelled => "The request was cancelled.".to_string(),
            ResilienceError::DeadlineExceeded(_) => "The request took too long.".to_string(),
            ResilienceError::OperationPanicked(_) => {
                "An internal error occurred while processing the request.".to_string()
            }
            ResilienceError::Config(message) => format!("Configuration error: {}", message),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), ErrorCode::Transient | ErrorCode::RateLimited)
    }
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay slept after the `attempt`-th failure (1-based): `base × 2^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}
