//! Central Error Types
//!
//! Error hierarchy for the resilient Aruba Central client.
//!
//! Every failure surfaced by [`ResilientClient::call`](crate::ResilientClient::call)
//! is one of the variants of [`CentralError`]. Internal recovery (retry,
//! token refresh, breaker fail-fast) has already been attempted by the time
//! an error reaches the caller.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the Aruba Central integration.
#[derive(Error, Debug)]
pub enum CentralError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Circuit breaker open - API unavailable, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl CentralError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CENTRAL_CONFIG",
            Self::CircuitOpen { .. } => "CENTRAL_CIRCUIT_OPEN",
            Self::Auth(_) => "CENTRAL_AUTH",
            Self::Transport(_) => "CENTRAL_TRANSPORT",
            Self::Upstream(UpstreamError::Server { .. }) => "CENTRAL_UPSTREAM_SERVER",
            Self::Upstream(UpstreamError::Client { .. }) => "CENTRAL_UPSTREAM_CLIENT",
            Self::Protocol(_) => "CENTRAL_PROTOCOL",
        }
    }

    /// Check if error is a transient transport fault worth retrying.
    ///
    /// HTTP status codes are never retryable here; interpreting them is the
    /// orchestrator's job.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP status carried by the error, if the upstream answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream(UpstreamError::Server { status, .. })
            | Self::Upstream(UpstreamError::Client { status, .. })
            | Self::Protocol(ProtocolError::UnexpectedStatus { status })
            | Self::Auth(AuthError::TokenRequestFailed { status, .. }) => Some(*status),
            Self::Auth(AuthError::Rejected) => Some(401),
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid URL for {field}: {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Invalid value for {variable}: {value}")]
    InvalidEnvironment { variable: String, value: String },
}

/// Authentication error.
///
/// `Clone` so that a single refresh outcome can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Client ID and client secret are required to generate an access token")]
    MissingCredentials,

    #[error("Token request failed with HTTP {status}: {message}")]
    TokenRequestFailed { status: u16, message: String },

    #[error("Token endpoint unreachable: {message}")]
    TokenEndpointUnreachable { message: String },

    #[error("Access token not found in OAuth2 response")]
    MissingAccessToken,

    #[error("Invalid token response: {message}")]
    InvalidTokenResponse { message: String },

    #[error("Could not build token request: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream rejected the refreshed access token")]
    Rejected,

    #[error("Token refresh aborted before completion")]
    RefreshAborted,
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connect timeout after {timeout:?}")]
    ConnectTimeout { timeout: Duration },

    #[error("Read timeout after {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },
}

impl TransportError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::ReadTimeout { .. } | Self::ConnectionFailed { .. }
        )
    }
}

/// Non-success HTTP answer from the Aruba Central API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Server error HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Client error HTTP {status}: {body}")]
    Client { status: u16, body: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

/// Result type for Aruba Central operations.
pub type CentralResult<T> = Result<T, CentralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_transport_errors_are_retryable() {
        assert!(CentralError::Transport(TransportError::ConnectTimeout {
            timeout: Duration::from_secs(30)
        })
        .is_retryable());
        assert!(CentralError::Transport(TransportError::ReadTimeout {
            timeout: Duration::from_secs(30)
        })
        .is_retryable());
        assert!(CentralError::Transport(TransportError::ConnectionFailed {
            message: "refused".to_string()
        })
        .is_retryable());

        assert!(!CentralError::Transport(TransportError::RequestFailed {
            message: "builder".to_string()
        })
        .is_retryable());
        assert!(!CentralError::Upstream(UpstreamError::Server {
            status: 503,
            body: String::new()
        })
        .is_retryable());
        assert!(!CentralError::CircuitOpen {
            retry_after: Duration::from_secs(5)
        }
        .is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let error = CentralError::CircuitOpen {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(error.retry_after(), Some(Duration::from_secs(42)));

        let error = CentralError::Auth(AuthError::Rejected);
        assert_eq!(error.retry_after(), None);
    }

    #[test]
    fn test_status_and_error_code() {
        let error = CentralError::Upstream(UpstreamError::Client {
            status: 404,
            body: "not found".to_string(),
        });
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.error_code(), "CENTRAL_UPSTREAM_CLIENT");

        let error = CentralError::Auth(AuthError::Rejected);
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.error_code(), "CENTRAL_AUTH");
    }
}
