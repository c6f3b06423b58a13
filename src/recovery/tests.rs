use super::*;
use crate::provider::ProviderId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn http_invoker(provider: &ProviderId) -> RetryInvoker {
    let classifier = Arc::new(ErrorClassifier::new());
    classifier.register(provider.clone(), classify_http_status);
    RetryInvoker::new(classifier)
}

#[test]
fn test_backoff_is_pure_exponential() {
    let policy = RetryPolicy::new(5, Duration::from_millis(10));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(80));
    assert_eq!(policy.max_attempts(), 6);
}

#[test]
fn test_http_status_mapping() {
    let provider = ProviderId::from("azure");

    let auth = classify_http_status(&ProviderFailure::http(401, "unauthorized"), &provider);
    assert_eq!(auth.code, ErrorCode::AuthenticationFailed);
    assert!(!auth.retryable);

    let quota = classify_http_status(&ProviderFailure::http(403, "forbidden"), &provider);
    assert_eq!(quota.code, ErrorCode::QuotaExceeded);
    assert!(!quota.retryable);

    let bad = classify_http_status(&ProviderFailure::http(400, "missing voice"), &provider);
    assert_eq!(bad.code, ErrorCode::BadRequest);
    assert!(!bad.retryable);
    assert!(bad.user_message.contains("missing voice"));

    let limited = classify_http_status(&ProviderFailure::http(429, "slow down"), &provider);
    assert_eq!(limited.code, ErrorCode::RateLimited);
    assert!(limited.retryable);

    let outage = classify_http_status(&ProviderFailure::http(503, "unavailable"), &provider);
    assert_eq!(outage.code, ErrorCode::Transient);
    assert!(outage.retryable);

    let network = classify_http_status(&ProviderFailure::Network("reset".into()), &provider);
    assert_eq!(network.code, ErrorCode::Transient);
    assert!(network.retryable);
}

#[test]
fn test_unmapped_provider_falls_back_to_transient() {
    let classifier = ErrorClassifier::new();
    classifier.register("azure", classify_http_status);

    let unknown = ProviderId::from("homebrew");
    let classified = classifier.classify(&ProviderFailure::http(401, "nope"), &unknown);
    assert_eq!(classified.code, ErrorCode::Transient);
    assert!(classified.retryable);

    let mapped = classifier.classify(&ProviderFailure::http(401, "nope"), &"azure".into());
    assert_eq!(mapped.code, ErrorCode::AuthenticationFailed);

    assert!(classifier.unregister(&"azure".into()));
    let after = classifier.classify(&ProviderFailure::http(401, "nope"), &"azure".into());
    assert_eq!(after.code, ErrorCode::Transient);
}

#[test]
fn test_custom_classifier_entry() {
    let classifier = ErrorClassifier::new();
    classifier.register("strict", |_: &ProviderFailure, _: &ProviderId| {
        ClassifiedError::new(ErrorCode::BadRequest, "never retry", false)
    });

    let classified = classifier.classify(&ProviderFailure::Other("x".into()), &"strict".into());
    assert_eq!(classified.code, ErrorCode::BadRequest);
    assert!(classifier.is_registered(&"strict".into()));
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds() {
    let provider = ProviderId::from("azure");
    let invoker = http_invoker(&provider);
    let calls = AtomicU32::new(0);
    let cancel = CancellationToken::new();

    let result = invoker
        .invoke(
            &provider,
            RetryPolicy::new(3, Duration::from_millis(10)),
            &cancel,
            || async {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= 2 {
                    Err(ProviderFailure::http(503, "busy"))
                } else {
                    Ok("audio")
                }
            },
        )
        .await;

    assert_eq!(result.unwrap(), "audio");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let stats = invoker.statistics().await;
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.error_types.get(&ErrorCode::Transient), Some(&2));
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_is_invoked_max_retries_plus_one() {
    let provider = ProviderId::from("azure");
    let invoker = http_invoker(&provider);
    let calls = AtomicU32::new(0);
    let cancel = CancellationToken::new();

    let result: Result<(), _> = invoker
        .invoke(
            &provider,
            RetryPolicy::new(2, Duration::from_millis(10)),
            &cancel,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderFailure::http(429, "rate limited"))
            },
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result {
        Err(ResilienceError::Provider { code, attempts, .. }) => {
            assert_eq!(code, ErrorCode::RateLimited);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_propagates_on_first_failure() {
    let provider = ProviderId::from("azure");
    let invoker = http_invoker(&provider);
    let calls = AtomicU32::new(0);
    let cancel = CancellationToken::new();

    let result: Result<(), _> = invoker
        .invoke(
            &provider,
            RetryPolicy::new(5, Duration::from_millis(10)),
            &cancel,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderFailure::http(401, "bad key"))
            },
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let error = result.unwrap_err();
    assert_eq!(error.code(), ErrorCode::AuthenticationFailed);
    assert!(!error.is_retryable());
    assert!(error.user_message().contains("Authentication"));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_sleeps_between_attempts() {
    let provider = ProviderId::from("azure");
    let invoker = http_invoker(&provider);
    let cancel = CancellationToken::new();
    let started = tokio::time::Instant::now();

    let _: Result<(), _> = invoker
        .invoke(
            &provider,
            RetryPolicy::new(3, Duration::from_millis(100)),
            &cancel,
            || async { Err(ProviderFailure::http(500, "boom")) },
        )
        .await;

    // 100 + 200 + 400
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let provider = ProviderId::from("azure");
    let invoker = Arc::new(http_invoker(&provider));
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));

    let handle = {
        let invoker = Arc::clone(&invoker);
        let cancel = cancel.clone();
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            invoker
                .invoke(
                    &ProviderId::from("azure"),
                    RetryPolicy::new(10, Duration::from_secs(60)),
                    &cancel,
                    || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err::<(), _>(ProviderFailure::http(503, "busy"))
                        }
                    },
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(ResilienceError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abort_error_is_not_retried() {
    let provider = ProviderId::from("azure");
    let invoker = http_invoker(&provider);
    let calls = AtomicU32::new(0);
    let cancel = CancellationToken::new();

    let result: Result<(), _> = invoker
        .invoke(
            &provider,
            RetryPolicy::new(3, Duration::from_millis(1)),
            &cancel,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Abort(ResilienceError::PoolClosed(
                    "azure".into(),
                )))
            },
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err().code(), ErrorCode::PoolClosed);
}
