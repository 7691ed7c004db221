//! Configuration Builder
//!
//! Fluent builder and environment loading for Aruba Central configuration.

use secrecy::SecretString;
use std::time::Duration;

use crate::error::{CentralError, CentralResult, ConfigurationError};
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use crate::types::{
    CentralConfig, ClientCredentials, DEFAULT_BASE_URL, DEFAULT_MAX_RESPONSE_SIZE,
    DEFAULT_TIMEOUT, DEFAULT_TOKEN_ENDPOINT, DEFAULT_TOKEN_REFRESH_BUFFER,
};

/// Values shipped in sample `.env` files; treated as unset.
const PLACEHOLDERS: [&str; 3] = ["your_client_id", "your_client_secret", "your_access_token"];

/// Aruba Central configuration builder.
pub struct CentralConfigBuilder {
    base_url: String,
    token_endpoint: String,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    access_token: Option<SecretString>,
    timeout: Duration,
    rate_limit: RateLimiterConfig,
    circuit_breaker: CircuitBreakerConfig,
    retry: RetryConfig,
    token_refresh_buffer: Duration,
    max_response_size: usize,
}

impl Default for CentralConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            client_id: None,
            client_secret: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            rate_limit: RateLimiterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            token_refresh_buffer: DEFAULT_TOKEN_REFRESH_BUFFER,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Set API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set a pre-issued access token.
    pub fn access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::new(access_token.into()));
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow `max_requests` per `window`.
    pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limit = RateLimiterConfig {
            max_requests,
            window,
        };
        self
    }

    /// Open the circuit after `failure_threshold` failures, for `timeout`.
    pub fn circuit_breaker(mut self, failure_threshold: u32, timeout: Duration) -> Self {
        self.circuit_breaker = CircuitBreakerConfig {
            failure_threshold,
            timeout,
        };
        self
    }

    /// Set transport retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Refresh tokens this long before they expire.
    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.token_refresh_buffer = buffer;
        self
    }

    /// Set maximum response body size.
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Load overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Unset, empty and placeholder values leave the builder unchanged.
    pub fn from_lookup<F>(mut self, lookup: F) -> CentralResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name).filter(|v| !v.is_empty() && !PLACEHOLDERS.contains(&v.as_str()))
        };

        if let Some(url) = get("ARUBA_BASE_URL") {
            self.base_url = url;
        }
        if let Some(id) = get("ARUBA_CLIENT_ID") {
            self.client_id = Some(id);
        }
        if let Some(secret) = get("ARUBA_CLIENT_SECRET") {
            self.client_secret = Some(SecretString::new(secret));
        }
        if let Some(token) = get("ARUBA_ACCESS_TOKEN") {
            self.access_token = Some(SecretString::new(token));
        }
        if let Some(value) = get("ARUBA_API_TIMEOUT") {
            let secs: f64 = parse_env("ARUBA_API_TIMEOUT", &value)?;
            if secs <= 0.0 {
                return Err(invalid_env("ARUBA_API_TIMEOUT", &value));
            }
            self.timeout = Duration::try_from_secs_f64(secs)
                .map_err(|_| invalid_env("ARUBA_API_TIMEOUT", &value))?;
        }
        if let Some(value) = get("ARUBA_RATE_LIMIT_MAX_REQUESTS") {
            self.rate_limit.max_requests = parse_env("ARUBA_RATE_LIMIT_MAX_REQUESTS", &value)?;
        }
        if let Some(value) = get("ARUBA_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window =
                Duration::from_secs(parse_env("ARUBA_RATE_LIMIT_WINDOW_SECS", &value)?);
        }
        if let Some(value) = get("ARUBA_CIRCUIT_FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold =
                parse_env("ARUBA_CIRCUIT_FAILURE_THRESHOLD", &value)?;
        }
        if let Some(value) = get("ARUBA_CIRCUIT_TIMEOUT_SECS") {
            self.circuit_breaker.timeout =
                Duration::from_secs(parse_env("ARUBA_CIRCUIT_TIMEOUT_SECS", &value)?);
        }

        Ok(self)
    }

    /// Build the configuration.
    pub fn build(self) -> CentralResult<CentralConfig> {
        validate_url("base_url", &self.base_url)?;
        validate_url("token_endpoint", &self.token_endpoint)?;

        match (&self.client_id, &self.client_secret) {
            (Some(_), None) => return Err(missing_field("client_secret")),
            (None, Some(_)) => return Err(missing_field("client_id")),
            _ => {}
        }

        if self.client_id.is_none() && self.access_token.is_none() {
            return Err(invalid_config(
                "either an access token or a client id and secret is required",
            ));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window.is_zero() {
            return Err(invalid_config("rate limit must allow at least one request per window"));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid_config("circuit breaker failure threshold must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid_config("retry max_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(invalid_config("timeout must be positive"));
        }

        Ok(CentralConfig {
            base_url: self.base_url,
            token_endpoint: self.token_endpoint,
            credentials: ClientCredentials {
                client_id: self.client_id,
                client_secret: self.client_secret,
                access_token: self.access_token,
            },
            timeout: self.timeout,
            rate_limit: self.rate_limit,
            circuit_breaker: self.circuit_breaker,
            retry: self.retry,
            token_refresh_buffer: self.token_refresh_buffer,
            max_response_size: self.max_response_size,
        })
    }
}

impl CentralConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> CentralResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> CentralResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        CentralConfigBuilder::new().from_lookup(lookup)?.build()
    }
}

fn validate_url(field: &str, value: &str) -> CentralResult<()> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(CentralError::Configuration(ConfigurationError::InvalidUrl {
            field: field.to_string(),
            url: value.to_string(),
        })),
    }
}

fn parse_env<T: std::str::FromStr>(variable: &str, value: &str) -> CentralResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_env(variable, value))
}

fn invalid_env(variable: &str, value: &str) -> CentralError {
    CentralError::Configuration(ConfigurationError::InvalidEnvironment {
        variable: variable.to_string(),
        value: value.to_string(),
    })
}

fn missing_field(field: &str) -> CentralError {
    CentralError::Configuration(ConfigurationError::MissingField {
        field: field.to_string(),
    })
}

fn invalid_config(message: &str) -> CentralError {
    CentralError::Configuration(ConfigurationError::InvalidConfig {
        message: message.to_string(),
    })
}

/// Create a new Aruba Central configuration builder.
pub fn central_config() -> CentralConfigBuilder {
    CentralConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_builder_success() {
        let config = central_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .rate_limit(10, Duration::from_secs(1))
            .circuit_breaker(3, Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert!(config.credentials.can_refresh());
    }

    #[test]
    fn test_builder_access_token_only() {
        let config = central_config().access_token("pre-issued").build().unwrap();
        assert!(!config.credentials.can_refresh());
        assert!(config.credentials.access_token.is_some());
    }

    #[test]
    fn test_builder_requires_some_credential() {
        let result = central_config().build();
        assert!(matches!(
            result,
            Err(CentralError::Configuration(ConfigurationError::InvalidConfig { .. }))
        ));
    }

    #[test]
    fn test_builder_half_a_credential_pair() {
        let result = central_config().client_id("only-id").build();
        assert!(matches!(
            result,
            Err(CentralError::Configuration(ConfigurationError::MissingField { ref field }))
                if field == "client_secret"
        ));
    }

    #[test]
    fn test_builder_rejects_bad_url_and_zero_limits() {
        assert!(central_config()
            .access_token("t")
            .base_url("not a url")
            .build()
            .is_err());
        assert!(central_config()
            .access_token("t")
            .rate_limit(0, Duration::from_secs(60))
            .build()
            .is_err());
        assert!(central_config()
            .access_token("t")
            .circuit_breaker(0, Duration::from_secs(60))
            .build()
            .is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = CentralConfig::from_lookup(lookup(&[
            ("ARUBA_BASE_URL", "https://eu1.api.central.example.com"),
            ("ARUBA_CLIENT_ID", "cid"),
            ("ARUBA_CLIENT_SECRET", "csecret"),
            ("ARUBA_API_TIMEOUT", "12.5"),
            ("ARUBA_RATE_LIMIT_MAX_REQUESTS", "50"),
            ("ARUBA_CIRCUIT_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://eu1.api.central.example.com");
        assert_eq!(config.credentials.client_id.as_deref(), Some("cid"));
        assert_eq!(
            config
                .credentials
                .client_secret
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
            Some("csecret")
        );
        assert_eq!(config.timeout, Duration::from_millis(12_500));
        assert_eq!(config.rate_limit.max_requests, 50);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_from_lookup_ignores_placeholders() {
        let result = CentralConfig::from_lookup(lookup(&[
            ("ARUBA_CLIENT_ID", "your_client_id"),
            ("ARUBA_CLIENT_SECRET", "your_client_secret"),
            ("ARUBA_ACCESS_TOKEN", "real-token"),
            ("ARUBA_BASE_URL", ""),
        ]))
        .unwrap();

        assert!(result.credentials.client_id.is_none());
        assert!(result.credentials.client_secret.is_none());
        assert!(result.credentials.access_token.is_some());
        assert_eq!(result.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = CentralConfig::from_lookup(lookup(&[
            ("ARUBA_ACCESS_TOKEN", "t"),
            ("ARUBA_API_TIMEOUT", "soon"),
        ]));
        assert!(matches!(
            result,
            Err(CentralError::Configuration(
                ConfigurationError::InvalidEnvironment { ref variable, .. }
            )) if variable == "ARUBA_API_TIMEOUT"
        ));

        for value in ["-1", "NaN", "inf", "1e20"] {
            let result = CentralConfig::from_lookup(lookup(&[
                ("ARUBA_ACCESS_TOKEN", "t"),
                ("ARUBA_API_TIMEOUT", value),
            ]));
            assert!(result.is_err(), "timeout {} accepted", value);
        }
    }
}
