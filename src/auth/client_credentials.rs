//! Client Credentials Flow
//!
//! RFC 6749 Section 4.4 - Client Credentials Grant against the HPE SSO
//! token endpoint.

use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::AuthError;
use crate::types::{ClientCredentials, TokenResponse};

/// Longest slice of an error body kept in [`AuthError::TokenRequestFailed`].
const MAX_ERROR_BODY: usize = 512;

/// Client credentials token request.
pub struct ClientCredentialsFlow {
    token_endpoint: String,
    credentials: ClientCredentials,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl ClientCredentialsFlow {
    /// Create new Client Credentials Flow.
    pub fn new(
        token_endpoint: impl Into<String>,
        credentials: ClientCredentials,
        timeout: Duration,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            credentials,
            timeout,
            transport,
        }
    }

    /// Whether both client id and secret are configured.
    pub fn can_request(&self) -> bool {
        self.credentials.can_refresh()
    }

    fn build_request_body(&self) -> Result<String, AuthError> {
        let (client_id, client_secret) =
            match (&self.credentials.client_id, &self.credentials.client_secret) {
                (Some(id), Some(secret)) => (id.as_str(), secret.expose_secret().as_str()),
                _ => return Err(AuthError::MissingCredentials),
            };

        serde_urlencoded::to_string([
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .map_err(|e| AuthError::InvalidRequest {
            message: e.to_string(),
        })
    }

    fn build_request_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());
        headers
    }

    /// Exchange the client credentials for an access token.
    ///
    /// The returned response always carries a non-empty `access_token`.
    pub async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        let http_request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_endpoint.clone(),
            headers: self.build_request_headers(),
            body: Some(self.build_request_body()?),
            timeout: Some(self.timeout),
        };

        let response = self
            .transport
            .send(http_request)
            .await
            .map_err(|e| AuthError::TokenEndpointUnreachable {
                message: e.to_string(),
            })?;

        if !response.is_success() {
            let mut message = response.body;
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(AuthError::TokenRequestFailed {
                status: response.status,
                message,
            });
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| AuthError::InvalidTokenResponse {
                message: e.to_string(),
            })?;

        match token_response.access_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token_response),
            _ => Err(AuthError::MissingAccessToken),
        }
    }
}
