//! Tests for resilience patterns.

use aruba_central_integration::{
    central_config, Authenticator, CentralError, CircuitBreaker, CircuitBreakerConfig,
    CircuitState, HttpMethod, HttpRequest, HttpTransport, MockHttpTransport, RateLimiterConfig,
    RetryExecutor, RetryingTransport, TokenBucketRateLimiter, TransportError,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_tokens_stay_in_bounds() {
    let limiter = TokenBucketRateLimiter::new(RateLimiterConfig {
        max_requests: 5,
        window: Duration::from_secs(1),
    });

    for i in 0..50 {
        limiter.acquire().await;
        let tokens = limiter.available_tokens();
        assert!((0.0..=5.0).contains(&tokens), "tokens {} after acquire {}", tokens, i);
        if i % 7 == 0 {
            tokio::time::advance(Duration::from_millis(300)).await;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_throughput_matches_window() {
    let limiter = TokenBucketRateLimiter::new(RateLimiterConfig {
        max_requests: 10,
        window: Duration::from_secs(1),
    });
    let started = Instant::now();

    // 10 from the full bucket, 10 more need one full window of refill
    for _ in 0..20 {
        limiter.acquire().await;
    }

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(950), "elapsed {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(1100), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_example_scenario() {
    let cb = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 5,
        timeout: Duration::from_secs(60),
    });

    for _ in 0..5 {
        assert_ok!(cb.check());
        cb.record_failure();
    }
    assert_eq!(cb.state(), CircuitState::Open);

    let err = assert_err!(cb.check());
    assert!(err.retry_after().is_some());

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_ok!(cb.check());
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_bound_and_backoff() {
    let mock = Arc::new(MockHttpTransport::new());
    for _ in 0..5 {
        mock.queue_error(CentralError::Transport(TransportError::ConnectTimeout {
            timeout: Duration::from_secs(30),
        }));
    }

    let transport = RetryingTransport::new(mock.clone(), RetryExecutor::default());
    let started = Instant::now();
    let result = transport
        .send(HttpRequest::new(HttpMethod::Get, "https://central.example.com/monitoring/v2/aps"))
        .await;

    assert!(matches!(
        result,
        Err(CentralError::Transport(TransportError::ConnectTimeout { .. }))
    ));
    assert_eq!(mock.request_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));

    let stats = transport.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_refresh() {
    let mock = Arc::new(MockHttpTransport::new());
    mock.set_delay(Duration::from_millis(250));
    mock.queue_json_response(
        200,
        &serde_json::json!({"access_token": "shared", "token_type": "Bearer", "expires_in": 7200}),
    );

    let config = central_config()
        .client_id("id")
        .client_secret("secret")
        .build()
        .unwrap();
    let auth = Authenticator::new(&config, mock.clone());

    let callers: Vec<_> = (0..25)
        .map(|_| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.refresh().await })
        })
        .collect();

    for result in join_all(callers).await {
        assert_eq!(result.unwrap().unwrap(), "shared");
    }
    assert_eq!(mock.request_count(), 1);
}
