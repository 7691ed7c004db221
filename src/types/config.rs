//! Configuration Types
//!
//! Aruba Central client configuration types.

use secrecy::SecretString;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};

/// Default Aruba Central API gateway.
pub const DEFAULT_BASE_URL: &str = "https://us1.api.central.arubanetworks.com";

/// HPE SSO token endpoint used for the client credentials grant.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://sso.common.cloud.hpe.com/as/token.oauth2";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh tokens this long before they expire.
pub const DEFAULT_TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Largest response body accepted from the API (16 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Query parameters for an API call, kept ordered so URLs are deterministic.
pub type QueryParams = BTreeMap<String, String>;

/// Aruba Central client configuration.
#[derive(Clone, Debug)]
pub struct CentralConfig {
    /// API base URL, endpoints are appended verbatim.
    pub base_url: String,
    /// OAuth2 token endpoint.
    pub token_endpoint: String,
    /// Client credentials and optional pre-issued token.
    pub credentials: ClientCredentials,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Outbound rate limit.
    pub rate_limit: RateLimiterConfig,
    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Transport retry settings.
    pub retry: RetryConfig,
    /// Refresh a cached token when it is this close to expiry.
    pub token_refresh_buffer: Duration,
    /// Maximum accepted response body size in bytes.
    pub max_response_size: usize,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            credentials: ClientCredentials::default(),
            timeout: DEFAULT_TIMEOUT,
            rate_limit: RateLimiterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            token_refresh_buffer: DEFAULT_TOKEN_REFRESH_BUFFER,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl CentralConfig {
    /// Full URL for an endpoint path.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }
}

/// Credentials for the Aruba Central API.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    /// OAuth2 client identifier.
    pub client_id: Option<String>,
    /// OAuth2 client secret.
    pub client_secret: Option<SecretString>,
    /// Pre-issued access token, used until the API rejects it.
    pub access_token: Option<SecretString>,
}

impl ClientCredentials {
    /// Whether a client credentials exchange can be performed.
    pub fn can_refresh(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_without_double_slash() {
        let config = CentralConfig {
            base_url: "https://central.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint_url("/monitoring/v2/aps"),
            "https://central.example.com/monitoring/v2/aps"
        );
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = ClientCredentials {
            client_id: Some("client".to_string()),
            client_secret: Some(SecretString::new("hunter2".to_string())),
            access_token: None,
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("client"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
        assert!(credentials.can_refresh());
    }
}
