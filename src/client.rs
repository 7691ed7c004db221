//! Resilient Client
//!
//! Single entry point for Aruba Central API calls. Each call passes through
//! the circuit breaker, the rate limiter and the authenticator before it is
//! sent through the retrying transport, and its outcome is fed back into the
//! circuit breaker.

use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

use crate::auth::Authenticator;
use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{
    AuthError, CentralError, CentralResult, ConfigurationError, ProtocolError, UpstreamError,
};
use crate::resilience::{
    CircuitBreaker, CircuitState, RetryExecutor, RetryingTransport, TokenBucketRateLimiter,
};
use crate::telemetry::{CentralMetrics, NoOpMetrics};
use crate::types::{CentralConfig, QueryParams};

/// Point-in-time view of the client's resilience state.
#[derive(Debug, Clone)]
pub struct ClientHealth {
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub available_tokens: f64,
    pub has_token: bool,
    pub token_refreshing: bool,
}

impl ClientHealth {
    /// Whether calls are currently admitted.
    pub fn is_healthy(&self) -> bool {
        self.circuit_state != CircuitState::Open
    }
}

/// Resilient Aruba Central API client.
///
/// Construct one per process and share it; all state is internally
/// synchronized.
pub struct ResilientClient {
    config: CentralConfig,
    limiter: TokenBucketRateLimiter,
    breaker: CircuitBreaker,
    authenticator: Authenticator,
    transport: RetryingTransport,
    metrics: Arc<dyn CentralMetrics>,
}

impl ResilientClient {
    /// Create a client with the reqwest transport and no metrics.
    pub fn new(config: CentralConfig) -> CentralResult<Self> {
        let transport = ReqwestHttpTransport::new(config.timeout, config.max_response_size)?;
        Ok(Self::with_components(
            config,
            Arc::new(transport),
            Arc::new(NoOpMetrics),
        ))
    }

    /// Create a client with custom transport and metrics.
    ///
    /// API requests go through `transport` wrapped in retry; token requests
    /// use `transport` directly.
    pub fn with_components(
        config: CentralConfig,
        transport: Arc<dyn HttpTransport>,
        metrics: Arc<dyn CentralMetrics>,
    ) -> Self {
        let limiter =
            TokenBucketRateLimiter::with_metrics(config.rate_limit.clone(), metrics.clone());
        let breaker = CircuitBreaker::with_metrics(config.circuit_breaker.clone(), metrics.clone());
        let authenticator =
            Authenticator::with_metrics(&config, transport.clone(), metrics.clone());
        let executor = RetryExecutor::with_metrics(config.retry.clone(), metrics.clone());

        Self {
            limiter,
            breaker,
            authenticator,
            transport: RetryingTransport::new(transport, executor),
            metrics,
            config,
        }
    }

    /// Call an API endpoint and return its JSON body.
    ///
    /// `endpoint` is appended to the base URL as given, e.g.
    /// `/monitoring/v2/aps`. An empty 2xx body yields `Value::Null`.
    pub async fn call(
        &self,
        endpoint: &str,
        method: HttpMethod,
        params: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> CentralResult<Value> {
        let started = Instant::now();
        let result = self.execute(endpoint, method, params, body).await;
        let duration = started.elapsed();

        let (outcome, status) = match &result {
            Ok((status, _)) => ("success", Some(*status)),
            Err(CentralError::CircuitOpen { .. }) => ("circuit_open", None),
            Err(CentralError::Upstream(UpstreamError::Client { status, .. })) => {
                ("client_error", Some(*status))
            }
            Err(CentralError::Upstream(UpstreamError::Server { status, .. })) => {
                ("server_error", Some(*status))
            }
            Err(e) => ("error", e.status()),
        };
        self.metrics
            .record_api_call(endpoint, method.as_str(), outcome, status, duration);

        result.map(|(_, value)| value)
    }

    /// GET an endpoint.
    pub async fn get(&self, endpoint: &str, params: Option<&QueryParams>) -> CentralResult<Value> {
        self.call(endpoint, HttpMethod::Get, params, None).await
    }

    async fn execute(
        &self,
        endpoint: &str,
        method: HttpMethod,
        params: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> CentralResult<(u16, Value)> {
        if let Err(error) = self.breaker.check() {
            tracing::warn!(endpoint = endpoint, error = %error, "Call rejected by circuit breaker");
            return Err(error);
        }

        self.limiter.acquire().await;

        let token = self.authenticator.get_token().await?;
        let url = self.build_url(endpoint, params)?;
        let body = body.map(Value::to_string);

        tracing::debug!(method = %method, url = %url, "Calling Aruba Central API");
        let mut response = self
            .transport
            .send(self.build_request(method, &url, &token, body.clone()))
            .await?;

        if response.status == 401 {
            tracing::warn!(
                endpoint = endpoint,
                "Access token rejected, refreshing and resending once"
            );
            let token = self.authenticator.refresh_rejected(&token).await?;
            response = self
                .transport
                .send(self.build_request(method, &url, &token, body))
                .await?;

            if response.status == 401 {
                tracing::error!(endpoint = endpoint, "Refreshed access token rejected");
                return Err(AuthError::Rejected.into());
            }
        }

        self.classify(endpoint, response)
    }

    fn build_url(&self, endpoint: &str, params: Option<&QueryParams>) -> CentralResult<String> {
        let raw = self.config.endpoint_url(endpoint);
        let mut url = url::Url::parse(&raw).map_err(|_| {
            CentralError::Configuration(ConfigurationError::InvalidUrl {
                field: "endpoint".to_string(),
                url: raw.clone(),
            })
        })?;

        if let Some(params) = params.filter(|p| !p.is_empty()) {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url.into())
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<String>,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .timeout(self.config.timeout);
        request.body = body;
        request
    }

    fn classify(&self, endpoint: &str, response: HttpResponse) -> CentralResult<(u16, Value)> {
        let status = response.status;
        match status {
            200..=299 => {
                self.breaker.record_success();
                if response.body.trim().is_empty() {
                    return Ok((status, Value::Null));
                }
                let value = serde_json::from_str(&response.body).map_err(|e| {
                    CentralError::Protocol(ProtocolError::InvalidJson {
                        message: e.to_string(),
                    })
                })?;
                Ok((status, value))
            }
            500..=599 => {
                tracing::warn!(endpoint = endpoint, status = status, "Aruba Central server error");
                self.breaker.record_failure();
                Err(UpstreamError::Server {
                    status,
                    body: response.body,
                }
                .into())
            }
            400..=499 => {
                tracing::debug!(endpoint = endpoint, status = status, "Aruba Central client error");
                Err(UpstreamError::Client {
                    status,
                    body: response.body,
                }
                .into())
            }
            _ => Err(ProtocolError::UnexpectedStatus { status }.into()),
        }
    }

    /// Resilience snapshot.
    pub fn health(&self) -> ClientHealth {
        ClientHealth {
            circuit_state: self.breaker.state(),
            consecutive_failures: self.breaker.failures(),
            available_tokens: self.limiter.available_tokens(),
            has_token: self.authenticator.has_token(),
            token_refreshing: self.authenticator.is_refreshing(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CentralConfig {
        &self.config
    }

    /// The circuit breaker guarding this client.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The rate limiter used by this client.
    pub fn rate_limiter(&self) -> &TokenBucketRateLimiter {
        &self.limiter
    }

    /// The authenticator holding this client's token.
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}
