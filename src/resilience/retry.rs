//! Retry Logic
//!
//! Bounded exponential backoff for transient transport faults.
//!
//! Only connect timeouts, read timeouts and connection failures are
//! retried. HTTP status codes are never retried here. When the last attempt
//! still fails, its error is returned unchanged.

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::CentralError;
use crate::telemetry::{CentralMetrics, NoOpMetrics};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Retry statistics.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub retries: u64,
    pub successful_retries: u64,
    pub exhausted: u64,
}

/// Retry executor.
pub struct RetryExecutor {
    config: RetryConfig,
    stats: Mutex<RetryStats>,
    metrics: Arc<dyn CentralMetrics>,
}

impl RetryExecutor {
    /// Create new retry executor.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoOpMetrics))
    }

    /// Create retry executor reporting to `metrics`.
    pub fn with_metrics(config: RetryConfig, metrics: Arc<dyn CentralMetrics>) -> Self {
        Self {
            config,
            stats: Mutex::new(RetryStats::default()),
            metrics,
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut RetryStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }

    /// Delay before the retry that follows attempt `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_secs_f64()
            * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped_delay = base_delay.min(self.config.max_delay.as_secs_f64());

        let jitter = if self.config.jitter > 0.0 {
            let jitter_range = capped_delay * self.config.jitter;
            (rand::random::<f64>() - 0.5) * 2.0 * jitter_range
        } else {
            0.0
        };

        Duration::try_from_secs_f64((capped_delay + jitter).max(0.0))
            .unwrap_or(self.config.max_delay)
    }

    /// Execute an operation with retry logic.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, CentralError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CentralError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.update_stats(|s| s.total_attempts += 1);

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        self.update_stats(|s| s.successful_retries += 1);
                    }
                    return Ok(result);
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) if attempt >= max_attempts => {
                    tracing::warn!(attempts = attempt, error = %error, "Retries exhausted");
                    self.update_stats(|s| s.exhausted += 1);
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after transient error"
                    );
                    self.update_stats(|s| s.retries += 1);
                    self.metrics.record_retry(attempt, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get retry statistics.
    pub fn stats(&self) -> RetryStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Transport that retries transient failures of an inner transport.
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    executor: RetryExecutor,
}

impl RetryingTransport {
    /// Wrap `inner` with `executor`.
    pub fn new(inner: Arc<dyn HttpTransport>, executor: RetryExecutor) -> Self {
        Self { inner, executor }
    }

    /// Retry statistics.
    pub fn stats(&self) -> RetryStats {
        self.executor.stats()
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CentralError> {
        let inner = &self.inner;
        let request = &request;
        self.executor
            .execute(|| async move { inner.send(request.clone()).await })
            .await
    }
}
