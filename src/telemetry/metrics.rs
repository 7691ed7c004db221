//! Metrics
//!
//! Observability hooks fired by the resilient client. Export format is left
//! to the implementor.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::resilience::CircuitState;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Client metrics interface.
pub trait CentralMetrics: Send + Sync {
    /// Record a completed API call. `status` is `None` when no response arrived.
    fn record_api_call(
        &self,
        endpoint: &str,
        method: &str,
        outcome: &str,
        status: Option<u16>,
        duration: Duration,
    );

    /// Record a transport retry about to sleep `delay`.
    fn record_retry(&self, attempt: u32, delay: Duration);

    /// Record circuit breaker state change.
    fn record_circuit_transition(&self, from: CircuitState, to: CircuitState);

    /// Set the consecutive failure gauge.
    fn record_circuit_failures(&self, failures: u32);

    /// Record time spent waiting for a rate limit token.
    fn record_rate_limit_wait(&self, waited: Duration);

    /// Set the available tokens gauge.
    fn set_rate_limiter_tokens(&self, tokens: f64);

    /// Record an OAuth2 token refresh.
    fn record_token_refresh(&self, duration: Duration, success: bool);

    /// Record a caller that joined an in-flight refresh.
    fn record_refresh_coalesced(&self);
}

/// No-op metrics implementation.
pub struct NoOpMetrics;

impl CentralMetrics for NoOpMetrics {
    fn record_api_call(&self, _: &str, _: &str, _: &str, _: Option<u16>, _: Duration) {}
    fn record_retry(&self, _attempt: u32, _delay: Duration) {}
    fn record_circuit_transition(&self, _from: CircuitState, _to: CircuitState) {}
    fn record_circuit_failures(&self, _failures: u32) {}
    fn record_rate_limit_wait(&self, _waited: Duration) {}
    fn set_rate_limiter_tokens(&self, _tokens: f64) {}
    fn record_token_refresh(&self, _duration: Duration, _success: bool) {}
    fn record_refresh_coalesced(&self) {}
}

/// Metric names emitted by [`InMemoryMetrics`].
pub struct MetricNames;

impl MetricNames {
    pub const API_CALLS_TOTAL: &'static str = "api_calls_total";
    pub const API_CALL_DURATION_SECONDS: &'static str = "api_call_duration_seconds";
    pub const API_RETRIES_TOTAL: &'static str = "api_retries_total";
    pub const CIRCUIT_BREAKER_STATE: &'static str = "circuit_breaker_state";
    pub const CIRCUIT_BREAKER_FAILURES: &'static str = "circuit_breaker_failures";
    pub const CIRCUIT_BREAKER_OPENS_TOTAL: &'static str = "circuit_breaker_opens_total";
    pub const RATE_LIMITER_WAIT_SECONDS: &'static str = "rate_limiter_wait_time_seconds";
    pub const RATE_LIMITER_TOKENS_AVAILABLE: &'static str = "rate_limiter_tokens_available";
    pub const TOKEN_REFRESHES_TOTAL: &'static str = "oauth2_token_refreshes_total";
    pub const TOKEN_REFRESH_DURATION_SECONDS: &'static str =
        "oauth2_token_refresh_duration_seconds";
    pub const CONCURRENT_REFRESH_PREVENTED: &'static str = "oauth2_concurrent_refresh_prevented";
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: DateTime<Utc>,
}

/// In-memory metrics for testing.
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of entries recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|e| e.name == name).count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MetricEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        self.lock().push(MetricEntry {
            name: name.to_string(),
            value,
            labels,
            timestamp: Utc::now(),
        });
    }
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralMetrics for InMemoryMetrics {
    fn record_api_call(
        &self,
        endpoint: &str,
        method: &str,
        outcome: &str,
        status: Option<u16>,
        duration: Duration,
    ) {
        let mut labels = MetricLabels::new();
        labels.insert("endpoint".to_string(), endpoint.to_string());
        labels.insert("method".to_string(), method.to_string());
        labels.insert("status".to_string(), outcome.to_string());
        self.record(
            MetricNames::API_CALL_DURATION_SECONDS,
            duration.as_secs_f64(),
            labels.clone(),
        );

        labels.insert(
            "status_code".to_string(),
            status.map_or_else(|| "error".to_string(), |s| s.to_string()),
        );
        self.record(MetricNames::API_CALLS_TOTAL, 1.0, labels);
    }

    fn record_retry(&self, attempt: u32, delay: Duration) {
        let mut labels = MetricLabels::new();
        labels.insert("attempt".to_string(), attempt.to_string());
        self.record(MetricNames::API_RETRIES_TOTAL, delay.as_secs_f64(), labels);
    }

    fn record_circuit_transition(&self, from: CircuitState, to: CircuitState) {
        let mut labels = MetricLabels::new();
        labels.insert("from".to_string(), from.as_str().to_string());
        labels.insert("to".to_string(), to.as_str().to_string());
        self.record(MetricNames::CIRCUIT_BREAKER_STATE, to.as_gauge(), labels);

        if to == CircuitState::Open {
            self.record(MetricNames::CIRCUIT_BREAKER_OPENS_TOTAL, 1.0, MetricLabels::new());
        }
    }

    fn record_circuit_failures(&self, failures: u32) {
        self.record(
            MetricNames::CIRCUIT_BREAKER_FAILURES,
            failures as f64,
            MetricLabels::new(),
        );
    }

    fn record_rate_limit_wait(&self, waited: Duration) {
        self.record(
            MetricNames::RATE_LIMITER_WAIT_SECONDS,
            waited.as_secs_f64(),
            MetricLabels::new(),
        );
    }

    fn set_rate_limiter_tokens(&self, tokens: f64) {
        self.record(
            MetricNames::RATE_LIMITER_TOKENS_AVAILABLE,
            tokens,
            MetricLabels::new(),
        );
    }

    fn record_token_refresh(&self, duration: Duration, success: bool) {
        let mut labels = MetricLabels::new();
        labels.insert(
            "status".to_string(),
            if success { "success" } else { "failure" }.to_string(),
        );
        self.record(MetricNames::TOKEN_REFRESHES_TOTAL, 1.0, labels);

        if success {
            self.record(
                MetricNames::TOKEN_REFRESH_DURATION_SECONDS,
                duration.as_secs_f64(),
                MetricLabels::new(),
            );
        }
    }

    fn record_refresh_coalesced(&self) {
        self.record(
            MetricNames::CONCURRENT_REFRESH_PREVENTED,
            1.0,
            MetricLabels::new(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_op_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_api_call("/monitoring/v2/aps", "GET", "success", Some(200), Duration::ZERO);
        metrics.record_circuit_transition(CircuitState::Closed, CircuitState::Open);
        metrics.record_token_refresh(Duration::from_millis(20), true);
    }

    #[test]
    fn test_api_call_records_count_and_duration() {
        let metrics = InMemoryMetrics::new();
        metrics.record_api_call(
            "/monitoring/v2/aps",
            "GET",
            "failure",
            Some(503),
            Duration::from_millis(250),
        );

        let calls = metrics.get_entries_by_name(MetricNames::API_CALLS_TOTAL);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].labels.get("status_code"), Some(&"503".to_string()));
        assert_eq!(calls[0].labels.get("status"), Some(&"failure".to_string()));

        let durations = metrics.get_entries_by_name(MetricNames::API_CALL_DURATION_SECONDS);
        assert_eq!(durations.len(), 1);
        assert!((durations[0].value - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_open_transition_counts_opens() {
        let metrics = InMemoryMetrics::new();
        metrics.record_circuit_transition(CircuitState::Closed, CircuitState::Open);
        metrics.record_circuit_transition(CircuitState::Open, CircuitState::HalfOpen);

        assert_eq!(metrics.count(MetricNames::CIRCUIT_BREAKER_OPENS_TOTAL), 1);
        let states = metrics.get_entries_by_name(MetricNames::CIRCUIT_BREAKER_STATE);
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].value, 2.0);
    }

    #[test]
    fn test_failed_refresh_has_no_duration() {
        let metrics = InMemoryMetrics::new();
        metrics.record_token_refresh(Duration::from_millis(10), false);

        assert_eq!(metrics.count(MetricNames::TOKEN_REFRESHES_TOTAL), 1);
        assert_eq!(metrics.count(MetricNames::TOKEN_REFRESH_DURATION_SECONDS), 0);

        metrics.clear();
        assert!(metrics.get_entries().is_empty());
    }
}
