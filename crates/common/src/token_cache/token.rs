//! The cached management token and its stored form.

use crate::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Margin subtracted from expiry before a token is considered unusable.
pub const DEFAULT_SAFETY_BUFFER: Duration = Duration::from_secs(300);

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// A Management API access token with its absolute expiry.
///
/// Tokens are never mutated; a refresh produces a new value that replaces
/// the old one in each tier.
#[derive(Clone)]
pub struct CachedToken {
    access_token: SecretString,
    expires_at: i64,
    scope: String,
    token_type: String,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl PartialEq for CachedToken {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.expires_at == other.expires_at
            && self.scope == other.scope
            && self.token_type == other.token_type
    }
}

impl Eq for CachedToken {}

impl CachedToken {
    /// Create a token that expires at `expires_at` (Unix seconds).
    #[must_use]
    pub fn new(access_token: SecretString, expires_at: i64) -> Self {
        Self {
            access_token,
            expires_at,
            scope: String::new(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
        }
    }

    /// Set the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the token type reported by the issuer.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// The bearer credential.
    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Absolute expiry, Unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Space-separated scopes granted.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Token type, normally `Bearer`.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Whether the token can still be handed out, measured against the
    /// current wall clock.
    #[must_use]
    pub fn is_usable(&self, safety_buffer: Duration) -> bool {
        self.is_usable_at(safety_buffer, chrono::Utc::now().timestamp())
    }

    /// Deterministic variant of [`CachedToken::is_usable`].
    ///
    /// Usable iff `now < expires_at - safety_buffer`.
    #[must_use]
    pub fn is_usable_at(&self, safety_buffer: Duration, now: i64) -> bool {
        let buffer_secs = i64::try_from(safety_buffer.as_secs()).unwrap_or(i64::MAX);
        now < self.expires_at.saturating_sub(buffer_secs)
    }

    pub(crate) fn to_stored_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StoredToken {
            access_token: self.access_token.expose_secret().to_string(),
            expires_at: self.expires_at,
            scope: self.scope.clone(),
            token_type: self.token_type.clone(),
        })
    }

    pub(crate) fn from_stored_json(raw: &str) -> Result<Self, StoredTokenError> {
        let stored: StoredToken = serde_json::from_str(raw)?;
        if stored.access_token.trim().is_empty() {
            return Err(StoredTokenError::EmptyToken);
        }
        Ok(Self {
            access_token: SecretString::from(stored.access_token),
            expires_at: stored.expires_at,
            scope: stored.scope,
            token_type: stored.token_type,
        })
    }
}

/// Why a stored token value could not be used.
#[derive(Error, Debug)]
pub(crate) enum StoredTokenError {
    #[error("stored token is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored token has an empty access_token")]
    EmptyToken,
}

/// Serialized form kept in the parameter store.
#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    expires_at: i64,
    #[serde(default)]
    scope: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn token_expiring_in(secs: i64) -> CachedToken {
        CachedToken::new(SecretString::from("tok"), NOW + secs)
    }

    #[test]
    fn test_four_minutes_left_is_unusable() {
        assert!(!token_expiring_in(4 * 60).is_usable_at(DEFAULT_SAFETY_BUFFER, NOW));
    }

    #[test]
    fn test_six_minutes_left_is_usable() {
        assert!(token_expiring_in(6 * 60).is_usable_at(DEFAULT_SAFETY_BUFFER, NOW));
    }

    #[test]
    fn test_exact_buffer_boundary_is_unusable() {
        // now == expires_at - buffer is already too late
        assert!(!token_expiring_in(300).is_usable_at(DEFAULT_SAFETY_BUFFER, NOW));
        assert!(token_expiring_in(301).is_usable_at(DEFAULT_SAFETY_BUFFER, NOW));
    }

    #[test]
    fn test_expired_token_is_unusable() {
        assert!(!token_expiring_in(-10).is_usable_at(Duration::ZERO, NOW));
    }

    #[test]
    fn test_custom_buffer() {
        let token = token_expiring_in(90);
        assert!(token.is_usable_at(Duration::from_secs(60), NOW));
        assert!(!token.is_usable_at(Duration::from_secs(120), NOW));
    }

    #[test]
    fn test_is_usable_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        let fresh = CachedToken::new(SecretString::from("t"), now + 3600);
        let stale = CachedToken::new(SecretString::from("t"), now + 60);
        assert!(fresh.is_usable(DEFAULT_SAFETY_BUFFER));
        assert!(!stale.is_usable(DEFAULT_SAFETY_BUFFER));
    }

    #[test]
    fn test_stored_json_preserves_all_fields() {
        let token = token_expiring_in(3600)
            .with_scope("read:users create:users")
            .with_token_type("Bearer");

        let json = token.to_stored_json().unwrap();
        let restored = CachedToken::from_stored_json(&json).unwrap();
        assert_eq!(restored, token);
    }

    #[test]
    fn test_stored_json_defaults_optional_fields() {
        let restored =
            CachedToken::from_stored_json(r#"{"access_token":"abc","expires_at":42}"#).unwrap();
        assert_eq!(restored.scope(), "");
        assert_eq!(restored.token_type(), "Bearer");
        assert_eq!(restored.expires_at(), 42);
    }

    #[test]
    fn test_stored_json_rejects_garbage() {
        assert!(matches!(
            CachedToken::from_stored_json("not json"),
            Err(StoredTokenError::Json(_))
        ));
        assert!(matches!(
            CachedToken::from_stored_json(r#"{"expires_at":42}"#),
            Err(StoredTokenError::Json(_))
        ));
        assert!(matches!(
            CachedToken::from_stored_json(r#"{"access_token":"","expires_at":42}"#),
            Err(StoredTokenError::EmptyToken)
        ));
    }

    #[test]
    fn test_equality_compares_secret() {
        let a = token_expiring_in(10);
        let b = CachedToken::new(SecretString::from("other"), NOW + 10);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = CachedToken::new(SecretString::from("very-secret-jwt"), NOW);
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret-jwt"));
    }
}
