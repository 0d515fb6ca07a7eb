//! JWKS client for fetching and caching the tenant's signing keys.
//!
//! Keys have no TTL. The cached set is used until a lookup misses; a miss
//! triggers exactly one refresh, which replaces the whole map. This picks
//! up rotations without polling the endpoint on every request.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Key lookup failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwksError {
    /// `kid` absent even after a refresh.
    #[error("Signing key not found")]
    UnknownSigner,

    /// The key set could not be fetched or parsed.
    #[error("Key set unavailable: {0}")]
    Unavailable(String),
}

/// Thread-safe JWKS client with refresh-on-miss caching.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Map of key ID to JWK; `None` until the first fetch.
    cache: RwLock<Option<HashMap<String, Jwk>>>,
}

impl JwksClient {
    /// Create a new JWKS client.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - the tenant's `/.well-known/jwks.json`
    /// * `http_timeout` - bound on each fetch
    #[must_use]
    pub fn new(jwks_url: String, http_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "admin.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
        }
    }

    /// Get a JWK by key ID.
    ///
    /// # Errors
    ///
    /// - `UnknownSigner` if `kid` is missing from the refreshed set
    /// - `Unavailable` if the refresh fails
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, JwksError> {
        if let Some(key) = self.cached_key(kid).await {
            tracing::debug!(target: "admin.auth.jwks", "JWKS cache hit");
            return Ok(key);
        }

        tracing::debug!(target: "admin.auth.jwks", "Key not in cached set, refreshing");
        self.refresh().await?;

        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        tracing::warn!(target: "admin.auth.jwks", "Key not found in JWKS after refresh");
        Err(JwksError::UnknownSigner)
    }

    async fn cached_key(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read().await;
        cache.as_ref().and_then(|keys| keys.get(kid).cloned())
    }

    /// Fetch the key set and replace the cached map.
    ///
    /// # Errors
    ///
    /// `Unavailable` on transport failure, non-2xx status or bad JSON.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), JwksError> {
        tracing::debug!(target: "admin.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "admin.auth.jwks", error = %e, "Failed to fetch JWKS");
                JwksError::Unavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "admin.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(JwksError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!(target: "admin.auth.jwks", error = %e, "Failed to parse JWKS response");
            JwksError::Unavailable(e.to_string())
        })?;

        // Keys without a kid can never be selected
        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter_map(|key| key.common.key_id.clone().map(|kid| (kid, key)))
            .collect();

        tracing::info!(
            target: "admin.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(keys);
        Ok(())
    }

    /// Number of keys currently cached.
    pub async fn cached_key_count(&self) -> usize {
        self.cache.read().await.as_ref().map_or(0, HashMap::len)
    }
}
