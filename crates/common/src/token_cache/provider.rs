//! Tier 3: OAuth 2.0 client-credentials exchange with Auth0.

use super::token::CachedToken;
use crate::credentials::CredentialBundle;
use crate::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the client-credentials exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport failure, timeout, or server error.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// Credentials rejected (400, 401, 403).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Response body unusable.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "http",
            Self::AuthenticationRejected(_) => "rejected",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Fetches fresh Management API tokens from the tenant's token endpoint.
#[derive(Debug, Clone)]
pub struct ClientCredentialsProvider {
    credentials: Arc<CredentialBundle>,
    http_client: reqwest::Client,
    token_url: String,
}

impl ClientCredentialsProvider {
    /// Build a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// `Configuration` if the HTTP client cannot be built.
    pub fn new(
        credentials: Arc<CredentialBundle>,
        http_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(http_timeout))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let token_url = credentials.token_url();
        Ok(Self {
            credentials,
            http_client,
            token_url,
        })
    }

    /// Perform one client-credentials exchange.
    ///
    /// # Errors
    ///
    /// See [`ProviderError`]. Response bodies of rejected requests are only
    /// logged at trace level.
    #[instrument(skip_all, fields(client_id = %self.credentials.client_id))]
    pub async fn fetch_token(&self) -> Result<CachedToken, ProviderError> {
        debug!(
            target: "common.token_cache",
            url = %self.token_url,
            "Requesting management token from identity provider"
        );

        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.credentials.client_id,
            client_secret: self.credentials.client_secret.expose_secret(),
            audience: &self.credentials.audience,
        };

        let response = self
            .http_client
            .post(&self.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_cache", error = %e, "Token request failed");
                ProviderError::HttpError(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
                warn!(target: "common.token_cache", error = %e, "Failed to parse token response");
                ProviderError::InvalidResponse(e.to_string())
            })?;

            if token_response.access_token.trim().is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "empty access_token".to_string(),
                ));
            }

            let expires_in = i64::try_from(token_response.expires_in).map_err(|_| {
                ProviderError::InvalidResponse("expires_in out of range".to_string())
            })?;
            let expires_at = chrono::Utc::now().timestamp().saturating_add(expires_in);

            debug!(
                target: "common.token_cache",
                expires_in_secs = token_response.expires_in,
                "Management token acquired"
            );

            let mut token =
                CachedToken::new(SecretString::from(token_response.access_token), expires_at)
                    .with_scope(token_response.scope.unwrap_or_default());
            if let Some(token_type) = token_response.token_type {
                token = token.with_token_type(token_type);
            }
            Ok(token)
        } else if matches!(status.as_u16(), 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "common.token_cache", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "common.token_cache",
                status = %status,
                "Client credentials rejected by identity provider"
            );
            trace!(
                target: "common.token_cache",
                body = %body,
                "Rejection response body"
            );
            Err(ProviderError::AuthenticationRejected(format!(
                "Status {status}"
            )))
        } else if status.is_server_error() {
            warn!(
                target: "common.token_cache",
                status = %status,
                "Identity provider returned server error"
            );
            Err(ProviderError::HttpError(format!(
                "Identity provider server error: {status}"
            )))
        } else {
            warn!(
                target: "common.token_cache",
                status = %status,
                "Unexpected response from identity provider"
            );
            Err(ProviderError::HttpError(format!(
                "Unexpected status: {status}"
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> ClientCredentialsProvider {
        let credentials = CredentialBundle::new(
            server.uri(),
            "m2m-client".to_string(),
            SecretString::from("m2m-secret"),
        );
        ClientCredentialsProvider::new(Arc::new(credentials), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_token_sends_client_credentials_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": "m2m-client",
                "client_secret": "m2m-secret",
                "audience": format!("{}/api/v2/", server.uri()),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mgmt-token",
                "token_type": "Bearer",
                "expires_in": 86400,
                "scope": "read:users delete:users"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let before = chrono::Utc::now().timestamp();
        let token = provider_for(&server).fetch_token().await.unwrap();

        assert_eq!(token.access_token().expose_secret(), "mgmt-token");
        assert_eq!(token.scope(), "read:users delete:users");
        assert!(token.expires_at() >= before + 86400);
        assert!(token.expires_at() <= chrono::Utc::now().timestamp() + 86400);
    }

    #[tokio::test]
    async fn test_fetch_token_rejected_credentials() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "access_denied",
                "error_description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).fetch_token().await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationRejected(_)));
        assert!(!err.to_string().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_fetch_token_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider_for(&server).fetch_token().await.unwrap_err();
        assert!(matches!(err, ProviderError::HttpError(_)));
        assert_eq!(err.kind(), "http");
    }

    #[tokio::test]
    async fn test_fetch_token_invalid_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server).fetch_token().await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_empty_access_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).fetch_token().await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_token_unreachable() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        drop(server);

        let err = provider.fetch_token().await.unwrap_err();
        assert!(matches!(err, ProviderError::HttpError(_)));
    }
}
