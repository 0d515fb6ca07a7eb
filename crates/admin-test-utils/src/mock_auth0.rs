//! Mocked Auth0 tenant
//!
//! A `wiremock` server standing in for the tenant: JWKS, the
//! client-credentials token endpoint, and whatever Management API
//! responses a test mounts on `server()`.

use crate::crypto_fixtures::{jwks_json, SigningKeyFixture};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the JWKS document.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Path of the client-credentials endpoint.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Test double for an Auth0 tenant.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, usable as the tenant domain.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Issuer as Auth0 writes it (trailing slash).
    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{JWKS_PATH}", self.server.uri())
    }

    /// The underlying server, for mounting Management API mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Publish `keys` at the JWKS endpoint.
    pub async fn mount_jwks(&self, keys: &[&SigningKeyFixture]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Answer client-credentials requests with `access_token`.
    pub async fn mount_token_endpoint(&self, access_token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": expires_in,
                "scope": "read:users create:users delete:users update:users",
            })))
            .mount(&self.server)
            .await;
    }

    /// Like `mount_token_endpoint`, asserting the number of exchanges.
    pub async fn expect_token_requests(&self, access_token: &str, expires_in: u64, times: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": expires_in,
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }
}
