//! Authenticator
//!
//! Caches the bearer credential and refreshes it with single-flight
//! semantics: however many callers need a new token at the same time,
//! exactly one token request is sent and all of them receive its outcome.
//!
//! The token request runs on its own task. A caller that gives up waiting
//! does not cancel the refresh for anyone else.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::auth::ClientCredentialsFlow;
use crate::core::HttpTransport;
use crate::error::AuthError;
use crate::telemetry::{CentralMetrics, NoOpMetrics};
use crate::types::{CentralConfig, Credential};

type RefreshOutcome = Option<Result<Credential, AuthError>>;

struct AuthState {
    credential: Option<Credential>,
    refresh: Option<watch::Receiver<RefreshOutcome>>,
    generation: u64,
}

struct Inner {
    flow: ClientCredentialsFlow,
    refresh_buffer: Duration,
    state: Mutex<AuthState>,
    metrics: Arc<dyn CentralMetrics>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_refresh(self: Arc<Self>, generation: u64, tx: watch::Sender<RefreshOutcome>) {
        let _guard = InFlightGuard {
            inner: Arc::clone(&self),
            generation,
        };

        tracing::info!("Requesting new access token");
        let started = Instant::now();

        let outcome = self.flow.request_token().await.map(|response| {
            Credential::new(
                response.access_token.unwrap_or_default(),
                response.expires_in.map(Duration::from_secs),
            )
        });
        let elapsed = started.elapsed();

        match &outcome {
            Ok(credential) => {
                self.lock().credential = Some(credential.clone());
                tracing::info!(
                    expires_in_secs = ?credential.remaining().map(|d| d.as_secs()),
                    "Access token refreshed"
                );
            }
            Err(error) => {
                tracing::error!(error = %error, "Access token refresh failed");
            }
        }

        self.metrics.record_token_refresh(elapsed, outcome.is_ok());
        // the stored receiver keeps the channel open until the guard drops
        let _ = tx.send(Some(outcome));
    }
}

/// Clears the in-flight marker when the refresh task ends, panics included.
struct InFlightGuard {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        if state.generation == self.generation {
            state.refresh = None;
        }
    }
}

/// OAuth2 authenticator for the Aruba Central API.
///
/// Cheap to clone; clones share the cached credential.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<Inner>,
}

impl Authenticator {
    /// Create authenticator for `config`, seeded with its pre-issued token.
    pub fn new(config: &CentralConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_metrics(config, transport, Arc::new(NoOpMetrics))
    }

    /// Create authenticator reporting to `metrics`.
    pub fn with_metrics(
        config: &CentralConfig,
        transport: Arc<dyn HttpTransport>,
        metrics: Arc<dyn CentralMetrics>,
    ) -> Self {
        let flow = ClientCredentialsFlow::new(
            config.token_endpoint.clone(),
            config.credentials.clone(),
            config.timeout,
            transport,
        );
        let credential = config
            .credentials
            .access_token
            .as_ref()
            .map(Credential::pre_issued);

        Self {
            inner: Arc::new(Inner {
                flow,
                refresh_buffer: config.token_refresh_buffer,
                state: Mutex::new(AuthState {
                    credential,
                    refresh: None,
                    generation: 0,
                }),
                metrics,
            }),
        }
    }

    /// Current access token, obtaining a new one if none is cached or the
    /// cached one is about to expire.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let buffer = self.inner.refresh_buffer;
        self.obtain(|credential| !credential.is_expiring(buffer)).await
    }

    /// Obtain a new token unconditionally, joining a refresh already in
    /// flight if there is one.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        self.obtain(|_| false).await
    }

    /// Replace a token the API just rejected.
    ///
    /// If another caller already replaced `rejected`, the newer token is
    /// returned without contacting the token endpoint.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        let buffer = self.inner.refresh_buffer;
        self.obtain(|credential| {
            credential.access_token() != rejected && !credential.is_expiring(buffer)
        })
        .await
    }

    async fn obtain(&self, reusable: impl Fn(&Credential) -> bool) -> Result<String, AuthError> {
        let (mut rx, joined) = {
            let mut state = self.inner.lock();

            if let Some(credential) = state.credential.as_ref().filter(|c| reusable(c)) {
                return Ok(credential.access_token().to_string());
            }

            match state.refresh.clone() {
                Some(rx) => (rx, true),
                None => {
                    if !self.inner.flow.can_request() {
                        tracing::error!(
                            "Token refresh needed but client id and secret are not configured"
                        );
                        return Err(AuthError::MissingCredentials);
                    }

                    let (tx, rx) = watch::channel(None);
                    state.generation += 1;
                    state.refresh = Some(rx.clone());
                    tokio::spawn(Arc::clone(&self.inner).run_refresh(state.generation, tx));
                    (rx, false)
                }
            }
        };

        if joined {
            tracing::debug!("Joining in-flight token refresh");
            self.inner.metrics.record_refresh_coalesced();
        }

        let outcome = {
            let value = rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| AuthError::RefreshAborted)?;
            value.clone()
        };

        match outcome {
            Some(Ok(credential)) => Ok(credential.access_token().to_string()),
            Some(Err(error)) => Err(error),
            None => Err(AuthError::RefreshAborted),
        }
    }

    /// Cached credential, if any.
    pub fn current(&self) -> Option<Credential> {
        self.inner.lock().credential.clone()
    }

    /// Whether a credential is cached.
    pub fn has_token(&self) -> bool {
        self.inner.lock().credential.is_some()
    }

    /// Whether a token refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock().refresh.is_some()
    }

    /// Whether new tokens can be obtained from the token endpoint.
    pub fn can_refresh(&self) -> bool {
        self.inner.flow.can_request()
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Authenticator")
            .field("credential", &state.credential)
            .field("refreshing", &state.refresh.is_some())
            .finish()
    }
}
