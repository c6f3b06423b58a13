use crate::pool::HttpSession;
use crate::provider::types::{ProviderId, SynthesisRequest};
use crate::recovery::ProviderFailure;
use async_trait::async_trait;

/// Provider-specific request construction lives behind this trait.
///
/// The resilience layer never inspects the payload; it only looks at whether
/// the call succeeded and, on failure, hands the [`ProviderFailure`] to the
/// classifier registered for [`SpeechProvider::id`].
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Identifier used to key the provider's pool, classifier and cache entries
    fn id(&self) -> ProviderId;

    /// Synthesize `request` using a pooled HTTP session
    async fn synthesize(
        &self,
        session: &HttpSession,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, ProviderFailure>;

    /// Fetch provider metadata (voice catalogue, limits, ...)
    async fn describe(&self, session: &HttpSession) -> Result<serde_json::Value, ProviderFailure>;
}
