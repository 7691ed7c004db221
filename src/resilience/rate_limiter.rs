//! Rate Limiter
//!
//! Token bucket bounding the outbound request rate to Aruba Central.
//!
//! The bucket starts full and refills continuously at
//! `max_requests / window` tokens per second, never exceeding
//! `max_requests`. [`TokenBucketRateLimiter::acquire`] waits without an
//! upper bound; that is backpressure, not an error.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::telemetry::{CentralMetrics, NoOpMetrics};

/// Waits shorter than this are not reported as throttling.
const WAIT_REPORT_THRESHOLD: Duration = Duration::from_millis(10);

/// Longest single sleep while waiting for a token.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Bucket capacity and refill target per window.
    pub max_requests: u32,
    /// Time to refill from empty to `max_requests`.
    pub window: Duration,
}

impl RateLimiterConfig {
    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.max_requests as f64 / self.window.as_secs_f64()
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone, Default)]
pub struct RateLimiterStats {
    pub acquired: u64,
    pub throttled: u64,
    pub rejected: u64,
    pub total_wait: Duration,
}

struct RateState {
    tokens: f64,
    last_refill: Instant,
    stats: RateLimiterStats,
}

/// Token bucket rate limiter implementation.
pub struct TokenBucketRateLimiter {
    config: RateLimiterConfig,
    state: Mutex<RateState>,
    metrics: Arc<dyn CentralMetrics>,
}

impl TokenBucketRateLimiter {
    /// Create new rate limiter.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoOpMetrics))
    }

    /// Create rate limiter reporting to `metrics`.
    pub fn with_metrics(config: RateLimiterConfig, metrics: Arc<dyn CentralMetrics>) -> Self {
        tracing::info!(
            max_requests = config.max_requests,
            window_secs = config.window.as_secs_f64(),
            "Rate limiter initialized"
        );

        Self {
            state: Mutex::new(RateState {
                tokens: config.max_requests as f64,
                last_refill: Instant::now(),
                stats: RateLimiterStats::default(),
            }),
            config,
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refill_tokens(&self, state: &mut RateState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * self.config.refill_rate();

        state.tokens = (state.tokens + new_tokens).min(self.config.max_requests as f64);
        state.last_refill = now;
    }

    /// Time until the bucket holds one whole token, from `tokens`.
    fn deficit_wait(&self, tokens: f64) -> Duration {
        let deficit = (1.0 - tokens).max(0.0);
        let secs = (deficit / self.config.refill_rate()).min(MAX_POLL_INTERVAL.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(Duration::from_millis(1), MAX_POLL_INTERVAL)
    }

    /// Wait until a token is available, then consume it.
    ///
    /// Returns how long the caller waited. Dropping the future while it waits
    /// consumes nothing.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut logged = false;

        loop {
            let wait = {
                let mut state = self.lock();
                self.refill_tokens(&mut state);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    let waited = started.elapsed();
                    state.stats.acquired += 1;
                    if waited > WAIT_REPORT_THRESHOLD {
                        state.stats.throttled += 1;
                        state.stats.total_wait += waited;
                    }
                    let tokens = state.tokens;
                    drop(state);

                    tracing::debug!(remaining = tokens, "Rate limit token acquired");
                    self.metrics.set_rate_limiter_tokens(tokens);
                    if waited > WAIT_REPORT_THRESHOLD {
                        self.metrics.record_rate_limit_wait(waited);
                    }
                    return waited;
                }

                self.deficit_wait(state.tokens)
            };

            if !logged {
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit reached, waiting for token"
                );
                logged = true;
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        self.refill_tokens(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.stats.acquired += 1;
            true
        } else {
            state.stats.rejected += 1;
            false
        }
    }

    /// Currently available tokens, after refill.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.lock();
        self.refill_tokens(&mut state);
        state.tokens
    }

    /// Get rate limiter statistics.
    pub fn stats(&self) -> RateLimiterStats {
        self.lock().stats.clone()
    }

    /// Limiter configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl Default for TokenBucketRateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
