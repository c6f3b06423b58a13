use crate::pool::HttpSession;
use crate::provider::speech::SpeechProvider;
use crate::provider::types::{ProviderId, SynthesisRequest};
use crate::recovery::ProviderFailure;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Offline provider with configurable latency and failure injection.
///
/// Used by `speechrelay bench` and by tests that need a provider without
/// network access.
#[derive(Debug)]
pub struct SimulatedProvider {
    id: ProviderId,
    min_latency: Duration,
    max_latency: Duration,
    failure_rate: f64,
    failure_statuses: Vec<u16>,
    calls: AtomicU64,
}

impl SimulatedProvider {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            min_latency: Duration::from_millis(20),
            max_latency: Duration::from_millis(120),
            failure_rate: 0.0,
            failure_statuses: vec![429, 500, 503],
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min;
        self.max_latency = max.max(min);
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_failure_statuses(mut self, statuses: Vec<u16>) -> Self {
        if !statuses.is_empty() {
            self.failure_statuses = statuses;
        }
        self
    }

    /// Number of provider calls made so far, including failed ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn simulate_call(&self) -> Result<(), ProviderFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        // ThreadRng is not Send, keep it out of the await below
        let (latency, failure) = {
            let mut rng = rand::rng();
            let latency_ms = rng.random_range(
                self.min_latency.as_millis() as u64..=self.max_latency.as_millis() as u64,
            );
            let failure = if rng.random::<f64>() < self.failure_rate {
                let index = rng.random_range(0..self.failure_statuses.len());
                Some(self.failure_statuses[index])
            } else {
                None
            };
            (Duration::from_millis(latency_ms), failure)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match failure {
            Some(status) => Err(ProviderFailure::http(
                status,
                format!("simulated failure from {}", self.id),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpeechProvider for SimulatedProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    async fn synthesize(
        &self,
        _session: &HttpSession,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, ProviderFailure> {
        self.simulate_call().await?;

        let mut audio = Vec::with_capacity(request.text.len() + 16);
        audio.extend_from_slice(request.format.extension().as_bytes());
        audio.push(b':');
        if let Some(voice) = &request.voice {
            audio.extend_from_slice(voice.as_bytes());
        }
        audio.push(b':');
        audio.extend_from_slice(request.text.as_bytes());
        Ok(audio)
    }

    async fn describe(&self, _session: &HttpSession) -> Result<serde_json::Value, ProviderFailure> {
        self.simulate_call().await?;

        Ok(serde_json::json!({
            "provider": self.id.as_str(),
            "voices": ["simulated-neutral", "simulated-bright"],
            "formats": ["mp3", "wav", "ogg"],
        }))
    }
}
