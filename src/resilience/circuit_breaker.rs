//! Circuit Breaker
//!
//! Fail-fast protection for the Aruba Central API.
//!
//! ```text
//! Closed   → Open:     failures >= failure_threshold
//! Open     → HalfOpen: first check() after timeout has elapsed
//! HalfOpen → Closed:   record_success()
//! HalfOpen → Open:     record_failure()
//! ```
//!
//! `HalfOpen` admits every caller that observes it, not a single probe.
//! Concurrent probes that all fail reopen the circuit together.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{CentralError, CentralResult};
use crate::telemetry::{CentralMetrics, NoOpMetrics};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is testing recovery, requests are allowed.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding (0=CLOSED, 1=OPEN, 2=HALF_OPEN).
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to stay open before admitting a recovery attempt.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Circuit breaker statistics.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStats {
    pub checks: u64,
    pub rejected: u64,
    pub successes: u64,
    pub failures: u64,
    pub state_transitions: u64,
}

struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure_time: Option<Instant>,
    stats: CircuitBreakerStats,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState) -> Option<(CircuitState, CircuitState)> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        if to == CircuitState::Closed {
            self.failures = 0;
        }
        self.stats.state_transitions += 1;
        Some((from, to))
    }
}

/// Circuit breaker guarding upstream calls.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    metrics: Arc<dyn CentralMetrics>,
}

impl CircuitBreaker {
    /// Create new circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoOpMetrics))
    }

    /// Create circuit breaker reporting to `metrics`.
    pub fn with_metrics(config: CircuitBreakerConfig, metrics: Arc<dyn CentralMetrics>) -> Self {
        tracing::info!(
            failure_threshold = config.failure_threshold,
            timeout_secs = config.timeout.as_secs_f64(),
            "Circuit breaker initialized"
        );

        Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure_time: None,
                stats: CircuitBreakerStats::default(),
            }),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, transition: Option<(CircuitState, CircuitState)>, failures: u32) {
        if let Some((from, to)) = transition {
            self.metrics.record_circuit_transition(from, to);
        }
        self.metrics.record_circuit_failures(failures);
    }

    /// Check whether a call may proceed.
    ///
    /// Fails with [`CentralError::CircuitOpen`] while the circuit is open and
    /// the timeout has not elapsed. Advisory: callers still report the
    /// outcome through `record_success`/`record_failure`.
    pub fn check(&self) -> CentralResult<()> {
        let mut state = self.lock();
        state.stats.checks += 1;

        let current = state.state;
        match current {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);

                if elapsed > self.config.timeout {
                    let transition = state.transition(CircuitState::HalfOpen);
                    let failures = state.failures;
                    drop(state);

                    tracing::info!("Circuit breaker: OPEN → HALF_OPEN (testing recovery)");
                    self.publish(transition, failures);
                    return Ok(());
                }

                state.stats.rejected += 1;
                Err(CentralError::CircuitOpen {
                    retry_after: self.config.timeout.saturating_sub(elapsed),
                })
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.stats.successes += 1;

        let current = state.state;
        let transition = match current {
            CircuitState::HalfOpen => state.transition(CircuitState::Closed),
            CircuitState::Closed => {
                state.failures = 0;
                None
            }
            CircuitState::Open => return,
        };
        let failures = state.failures;
        drop(state);

        if transition.is_some() {
            tracing::info!("Circuit breaker: HALF_OPEN → CLOSED (service recovered)");
        }
        self.publish(transition, failures);
    }

    /// Record a failed call (upstream 5xx).
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.stats.failures += 1;
        state.failures += 1;
        state.last_failure_time = Some(Instant::now());

        let current = state.state;
        let transition = match current {
            CircuitState::HalfOpen => {
                tracing::warn!("Circuit breaker: HALF_OPEN → OPEN (recovery test failed)");
                state.transition(CircuitState::Open)
            }
            CircuitState::Closed if state.failures >= self.config.failure_threshold => {
                tracing::warn!(
                    failures = state.failures,
                    "Circuit breaker: CLOSED → OPEN (consecutive failures)"
                );
                state.transition(CircuitState::Open)
            }
            _ => None,
        };
        let failures = state.failures;
        drop(state);

        self.publish(transition, failures);
    }

    /// Current state without triggering the half-open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.lock().failures
    }

    /// Manually close the circuit.
    pub fn reset(&self) {
        let mut state = self.lock();
        let transition = state.transition(CircuitState::Closed);
        state.failures = 0;
        state.last_failure_time = None;
        drop(state);

        tracing::info!("Circuit breaker: manually reset to CLOSED");
        self.publish(transition, 0);
    }

    /// Get circuit breaker statistics.
    pub fn stats(&self) -> CircuitBreakerStats {
        self.lock().stats.clone()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{InMemoryMetrics, MetricNames};

    fn breaker(threshold: u32, timeout_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    #[test]
    fn test_starts_closed() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let cb = breaker(3, 60);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        match cb.check() {
            Err(CentralError::CircuitOpen { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(59));
            }
            other => panic!("expected CircuitOpen, got {:?}", other),
        }
        assert_eq!(cb.stats().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failures_when_closed() {
        let cb = breaker(3, 60);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failures(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_timeout() {
        let cb = breaker(5, 60);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert!(cb.check().is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cb.check().is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.check().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // every caller passes while half-open
        assert!(cb.check().is_ok());
        assert!(cb.check().is_ok());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(2, 10);
        cb.record_failure();
        cb.record_failure();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cb.check().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // last_failure_time was reset, so the full timeout applies again
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.check().is_err());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cb.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 0);
        assert!(cb.check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_reach_metrics() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let cb = CircuitBreaker::with_metrics(
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_secs(1),
            },
            metrics.clone(),
        );

        cb.record_failure();
        tokio::time::advance(Duration::from_secs(2)).await;
        cb.check().unwrap();
        cb.record_success();

        let states: Vec<f64> = metrics
            .get_entries_by_name(MetricNames::CIRCUIT_BREAKER_STATE)
            .iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(states, vec![1.0, 2.0, 0.0]);
        assert_eq!(cb.stats().state_transitions, 3);
    }
}
