//! Resilience Patterns
//!
//! Rate limiting, circuit breaker and retry for outbound Aruba Central calls.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use rate_limiter::{RateLimiterConfig, RateLimiterStats, TokenBucketRateLimiter};
pub use retry::{RetryConfig, RetryExecutor, RetryStats, RetryingTransport};
