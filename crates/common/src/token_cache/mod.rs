//! Three-tier lookaside cache for Auth0 Management API tokens.
//!
//! [`TokenCacheManager::get_management_token`] consults, in order:
//!
//! 1. **Memory**: a per-process slot. No I/O.
//! 2. **Store**: a durable parameter shared by every instance.
//! 3. **Provider**: a client-credentials exchange with the tenant.
//!
//! A hit in a slower tier is written back into every faster tier. A token
//! is only handed out while `now < expires_at - safety_buffer`.
//!
//! # Failure policy
//!
//! - Store read errors, timeouts and corrupt values count as a miss.
//! - Store write-back is best-effort; the fresh token is still returned.
//!   Consecutive write failures are counted and escalate to an error-level
//!   alert at a threshold.
//! - A provider failure fails the call with
//!   [`TokenCacheError::UpstreamExhausted`].
//! - A token the Management API refuses goes through
//!   [`TokenCacheManager::reject`], which never hands the same token back.
//!
//! Concurrent cold callers may each reach the provider. Every resulting
//! token is valid; the store keeps whichever was written last.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::{TokenCacheConfig, TokenCacheManager};
//!
//! let manager = TokenCacheManager::new(TokenCacheConfig::default(), credentials, store)?;
//! let token = manager.get_management_token().await?;
//! let header = format!("Bearer {}", token.access_token().expose_secret());
//! ```

mod memory;
mod metrics;
mod provider;
mod token;

pub use memory::MemoryTier;
pub use provider::{ClientCredentialsProvider, ProviderError, DEFAULT_HTTP_TIMEOUT};
pub use token::{CachedToken, DEFAULT_SAFETY_BUFFER};

use crate::credentials::CredentialBundle;
use crate::parameter_store::ParameterStore;
use crate::secret::ExposeSecret;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

// =============================================================================
// Constants
// =============================================================================

/// Parameter holding the shared token.
pub const DEFAULT_TOKEN_PARAMETER: &str = "/cruise-admin/prod/auth0-mgmt-token";

/// Bound on each parameter store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Consecutive write-back failures before the failure is logged as an alert.
pub const DEFAULT_WRITE_FAILURE_ALERT_THRESHOLD: u32 = 3;

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by the token cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenCacheError {
    /// Every tier missed and the provider exchange failed.
    #[error("Management token unavailable: {0}")]
    UpstreamExhausted(#[source] ProviderError),

    /// The manager could not be built.
    #[error("Token cache configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for [`TokenCacheManager`].
#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    /// Tier 2 parameter name.
    pub parameter_name: String,
    /// Margin before expiry at which a token stops being handed out.
    pub safety_buffer: Duration,
    /// Bound on each store call.
    pub store_timeout: Duration,
    /// Bound on each provider request.
    pub http_timeout: Duration,
    /// Consecutive write failures before alerting.
    pub write_failure_alert_threshold: u32,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            parameter_name: DEFAULT_TOKEN_PARAMETER.to_string(),
            safety_buffer: DEFAULT_SAFETY_BUFFER,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            write_failure_alert_threshold: DEFAULT_WRITE_FAILURE_ALERT_THRESHOLD,
        }
    }
}

impl TokenCacheConfig {
    /// Set the Tier 2 parameter name.
    #[must_use]
    pub fn with_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = name.into();
        self
    }

    /// Set the safety buffer.
    #[must_use]
    pub fn with_safety_buffer(mut self, buffer: Duration) -> Self {
        self.safety_buffer = buffer;
        self
    }

    /// Set the store call timeout.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the provider request timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the write-failure alert threshold.
    #[must_use]
    pub fn with_write_failure_alert_threshold(mut self, threshold: u32) -> Self {
        self.write_failure_alert_threshold = threshold.max(1);
        self
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Hands out Management API tokens from the fastest tier that has one.
///
/// One instance per process, shared behind an `Arc`.
pub struct TokenCacheManager {
    config: TokenCacheConfig,
    memory: MemoryTier,
    store: Arc<dyn ParameterStore>,
    provider: ClientCredentialsProvider,
    store_write_failures: AtomicU32,
}

impl std::fmt::Debug for TokenCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheManager")
            .field("config", &self.config)
            .field(
                "store_write_failures",
                &self.store_write_failures.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl TokenCacheManager {
    /// Create a manager with an empty memory tier.
    ///
    /// # Errors
    ///
    /// `Configuration` if the provider's HTTP client cannot be built.
    pub fn new(
        config: TokenCacheConfig,
        credentials: Arc<CredentialBundle>,
        store: Arc<dyn ParameterStore>,
    ) -> Result<Self, TokenCacheError> {
        let provider = ClientCredentialsProvider::new(credentials, config.http_timeout)
            .map_err(|e| TokenCacheError::Configuration(e.to_string()))?;

        Ok(Self {
            config,
            memory: MemoryTier::new(),
            store,
            provider,
            store_write_failures: AtomicU32::new(0),
        })
    }

    /// Return a usable management token.
    ///
    /// # Errors
    ///
    /// `UpstreamExhausted` when neither cache tier has a usable token and
    /// the provider exchange fails.
    #[instrument(skip_all)]
    pub async fn get_management_token(&self) -> Result<CachedToken, TokenCacheError> {
        if let Some(token) = self.read_memory().await {
            metrics::record_lookup("memory");
            return Ok(token);
        }

        if let Some(token) = self.read_store().await {
            self.write_memory(token.clone()).await;
            metrics::record_lookup("store");
            return Ok(token);
        }

        self.refresh_from_provider().await
    }

    /// Replace a token the Management API refused.
    ///
    /// Tier 1 is cleared. A Tier 2 token is used only if it differs from
    /// `rejected`, which means another instance already rotated it.
    /// Otherwise a new token is fetched and written to both tiers.
    ///
    /// # Errors
    ///
    /// `UpstreamExhausted` when the provider exchange fails.
    #[instrument(skip_all)]
    pub async fn reject(&self, rejected: &CachedToken) -> Result<CachedToken, TokenCacheError> {
        warn!(target: "common.token_cache", "Management token rejected upstream, refreshing");
        self.invalidate_memory().await;

        if let Some(token) = self.read_store().await {
            if token.access_token().expose_secret() != rejected.access_token().expose_secret() {
                self.write_memory(token.clone()).await;
                metrics::record_lookup("store");
                return Ok(token);
            }
            debug!(target: "common.token_cache", "Store tier holds the rejected token");
        }

        self.refresh_from_provider().await
    }

    async fn refresh_from_provider(&self) -> Result<CachedToken, TokenCacheError> {
        let token = self.fetch_from_provider().await?;
        metrics::record_lookup("provider");

        self.write_store(&token).await;
        self.write_memory(token.clone()).await;

        Ok(token)
    }

    /// Tier 1 lookup. Returns the entry only if it is still usable.
    pub async fn read_memory(&self) -> Option<CachedToken> {
        let token = self.memory.get().await?;
        if token.is_usable(self.config.safety_buffer) {
            Some(token)
        } else {
            debug!(
                target: "common.token_cache",
                expires_at = token.expires_at(),
                "Memory tier entry inside safety buffer"
            );
            None
        }
    }

    /// Tier 2 lookup. Any failure is logged and reported as a miss.
    #[instrument(skip_all, fields(parameter = %self.config.parameter_name))]
    pub async fn read_store(&self) -> Option<CachedToken> {
        let name = &self.config.parameter_name;

        let raw = match tokio::time::timeout(self.config.store_timeout, self.store.get(name)).await
        {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!(target: "common.token_cache", "Store tier has no token");
                return None;
            }
            Ok(Err(e)) => {
                warn!(target: "common.token_cache", error = %e, "Store tier read failed, treating as miss");
                metrics::record_store_read_failure("error");
                return None;
            }
            Err(_) => {
                warn!(
                    target: "common.token_cache",
                    timeout_ms = u64::try_from(self.config.store_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Store tier read timed out, treating as miss"
                );
                metrics::record_store_read_failure("timeout");
                return None;
            }
        };

        let token = match CachedToken::from_stored_json(&raw) {
            Ok(token) => token,
            Err(e) => {
                warn!(target: "common.token_cache", error = %e, "Store tier value unusable, treating as miss");
                metrics::record_store_read_failure("corrupt");
                return None;
            }
        };

        if token.is_usable(self.config.safety_buffer) {
            Some(token)
        } else {
            debug!(
                target: "common.token_cache",
                expires_at = token.expires_at(),
                "Store tier token inside safety buffer"
            );
            None
        }
    }

    /// Tier 3: exchange client credentials for a new token.
    ///
    /// # Errors
    ///
    /// `UpstreamExhausted` wrapping the provider failure.
    pub async fn fetch_from_provider(&self) -> Result<CachedToken, TokenCacheError> {
        let token = self.provider.fetch_token().await.map_err(|e| {
            error!(target: "common.token_cache", error = %e, "Management token unavailable from all tiers");
            metrics::record_provider_failure(e.kind());
            TokenCacheError::UpstreamExhausted(e)
        })?;

        if token.is_usable(self.config.safety_buffer) {
            info!(target: "common.token_cache", expires_at = token.expires_at(), "Fetched new management token");
        } else {
            warn!(
                target: "common.token_cache",
                expires_at = token.expires_at(),
                safety_buffer_secs = self.config.safety_buffer.as_secs(),
                "Provider issued a token shorter-lived than the safety buffer"
            );
        }

        Ok(token)
    }

    /// Write a token back to Tier 2.
    ///
    /// Failures and timeouts are logged and counted, never returned.
    #[instrument(skip_all, fields(parameter = %self.config.parameter_name))]
    pub async fn write_store(&self, token: &CachedToken) {
        let result = match token.to_stored_json() {
            Ok(json) => {
                match tokio::time::timeout(
                    self.config.store_timeout,
                    self.store.put(&self.config.parameter_name, &json),
                )
                .await
                {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("timed out".to_string()),
                }
            }
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => {
                let previous = self.store_write_failures.swap(0, Ordering::SeqCst);
                if previous >= self.config.write_failure_alert_threshold {
                    info!(
                        target: "common.token_cache",
                        previous_failures = previous,
                        "Store tier write-back recovered"
                    );
                }
                debug!(target: "common.token_cache", "Token written to store tier");
            }
            Err(reason) => {
                let failures = self
                    .store_write_failures
                    .fetch_add(1, Ordering::SeqCst)
                    .saturating_add(1);
                metrics::record_store_write_failure();

                if failures >= self.config.write_failure_alert_threshold {
                    error!(
                        target: "common.token_cache",
                        alert = true,
                        consecutive_failures = failures,
                        error = %reason,
                        "Store tier write-back keeps failing; every instance will hit the provider"
                    );
                } else {
                    warn!(
                        target: "common.token_cache",
                        consecutive_failures = failures,
                        error = %reason,
                        "Store tier write-back failed"
                    );
                }
            }
        }
    }

    /// Write a token to Tier 1.
    pub async fn write_memory(&self, token: CachedToken) {
        self.memory.set(token).await;
    }

    /// Drop the Tier 1 entry so the next call re-reads slower tiers.
    ///
    /// The store may still hold the same token; use [`Self::reject`] when
    /// the token itself was refused.
    pub async fn invalidate_memory(&self) {
        self.memory.clear().await;
    }

    /// Current streak of failed Tier 2 writes.
    #[must_use]
    pub fn consecutive_store_write_failures(&self) -> u32 {
        self.store_write_failures.load(Ordering::SeqCst)
    }

    /// Whether the write-failure streak has reached the alert threshold.
    #[must_use]
    pub fn is_store_degraded(&self) -> bool {
        self.consecutive_store_write_failures() >= self.config.write_failure_alert_threshold
    }

    /// Configured safety buffer.
    #[must_use]
    pub fn safety_buffer(&self) -> Duration {
        self.config.safety_buffer
    }
}

// =============================================================================
// Tests
// =============================================================================
