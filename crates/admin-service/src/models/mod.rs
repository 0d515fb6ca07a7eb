//! Admin service models.
//!
//! Request and response bodies for the HTTP surface, and the Auth0 user
//! record passed through from the Management API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Upper bound on accepted email length (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Upper bound on a given or family name.
pub const MAX_NAME_LENGTH: usize = 150;

/// Upper bound on favorites stored per user.
pub const MAX_FAVORITES: usize = 200;

/// User record as returned by the Management API.
///
/// Known fields are typed; everything else passes through untouched.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Auth0User {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Email is redacted in Debug output.
impl fmt::Debug for Auth0User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth0User")
            .field("user_id", &self.user_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("app_metadata", &self.app_metadata)
            .finish_non_exhaustive()
    }
}

/// Body for every successful admin response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StandardResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Health check response.
///
/// Returned by the `/v1/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded".
    pub status: String,

    /// "ok" or "degraded" for the token cache's durable tier.
    pub token_cache: String,

    /// Current streak of failed durable writes.
    pub store_write_failures: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteUserRequest {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFavoritesRequest {
    pub email: String,
    pub favorites: Vec<String>,
}

/// Characters with meaning in a user search query.
const QUERY_SYNTAX_CHARS: &[char] = &['"', '\\', '*'];

/// Plausibility check, not RFC 5322: one `@`, non-empty local part, a dot
/// in the domain, no whitespace and no search query syntax.
#[must_use]
pub fn is_plausible_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH
        || email.chars().any(char::is_whitespace)
        || email.contains(QUERY_SYNTAX_CHARS)
    {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Trimmed, non-empty, bounded name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= MAX_NAME_LENGTH
}
