//! Aruba Central Integration Module
//!
//! Resilient client for the Aruba Central network-management REST API.
//!
//! # Features
//!
//! - Token bucket rate limiting with backpressure
//! - Circuit breaker that opens on upstream 5xx responses only
//! - OAuth2 client credentials (RFC 6749 Section 4.4) with single-flight refresh
//! - Bounded exponential retry on transient transport faults
//! - Refresh-and-resend on 401
//!
//! # Example
//!
//! ```rust,ignore
//! use aruba_central_integration::{central_config, QueryParams, ResilientClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = central_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .rate_limit(100, Duration::from_secs(60))
//!         .build()?;
//!
//!     let client = ResilientClient::new(config)?;
//!
//!     let mut params = QueryParams::new();
//!     params.insert("limit".to_string(), "10".to_string());
//!     let aps = client.get("/monitoring/v2/aps", Some(&params)).await?;
//!
//!     println!("{}", aps);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration and token types
//! - `error`: error hierarchy
//! - `core`: HTTP transport abstraction
//! - `resilience`: rate limiter, circuit breaker, retry
//! - `auth`: client credentials exchange and token cache
//! - `telemetry`: metric hooks
//! - `builders`: fluent configuration builder and environment loading
//! - `client`: the resilient client combining all of the above

pub mod auth;
pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod resilience;
pub mod telemetry;
pub mod types;

// Re-export main client
pub use client::{ClientHealth, ResilientClient};

// Re-export builders
pub use builders::{central_config, CentralConfigBuilder};

// Re-export errors
pub use error::{
    AuthError, CentralError, CentralResult, ConfigurationError, ProtocolError, TransportError,
    UpstreamError,
};

// Re-export types
pub use types::{
    CentralConfig, ClientCredentials, Credential, QueryParams, TokenResponse, DEFAULT_BASE_URL,
    DEFAULT_TOKEN_ENDPOINT,
};

// Re-export core components
pub use core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export auth
pub use auth::{Authenticator, ClientCredentialsFlow};

// Re-export resilience
pub use resilience::{
    // Retry
    RetryConfig, RetryExecutor, RetryStats, RetryingTransport,
    // Circuit Breaker
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
    // Rate Limiter
    RateLimiterConfig, RateLimiterStats, TokenBucketRateLimiter,
};

// Re-export telemetry
pub use telemetry::{
    CentralMetrics, InMemoryMetrics, MetricEntry, MetricLabels, MetricNames, NoOpMetrics,
};
