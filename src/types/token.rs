//! Token Types
//!
//! OAuth2 token response and the cached bearer credential.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Token endpoint response (RFC 6749 Section 5.1).
///
/// `access_token` is optional here so that a response without it maps to a
/// dedicated error instead of a generic parse failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Cached bearer credential.
///
/// Immutable once built; a refresh replaces the whole value.
#[derive(Clone)]
pub struct Credential {
    access_token: SecretString,
    expires_at: Option<Instant>,
    lifetime: Option<Duration>,
    obtained_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential that expires `expires_in` from now.
    pub fn new(access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            expires_at: expires_in.map(|d| Instant::now() + d),
            lifetime: expires_in,
            obtained_at: Utc::now(),
        }
    }

    /// Credential for a pre-issued token with unknown lifetime.
    pub fn pre_issued(access_token: &SecretString) -> Self {
        Self {
            access_token: access_token.clone(),
            expires_at: None,
            lifetime: None,
            obtained_at: Utc::now(),
        }
    }

    /// The bearer token value.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// When the token expires, if the provider said.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Wall-clock time the credential was obtained.
    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Whether the token expires within `buffer`. Tokens without expiry never do.
    ///
    /// The buffer is capped at half the granted lifetime, so a token issued
    /// for less than `buffer` is still reused for its first half.
    pub fn is_expiring(&self, buffer: Duration) -> bool {
        match (self.expires_at, self.lifetime) {
            (Some(exp), Some(lifetime)) => Instant::now() + buffer.min(lifetime / 2) >= exp,
            _ => false,
        }
    }

    /// Time left before expiry.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}
