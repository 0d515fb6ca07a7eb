//! Validated token claims.
//!
//! `RawClaims` is the wire shape decoded by `jsonwebtoken`; `Principal` is
//! what the rest of the service sees. The subject is redacted in Debug
//! output.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// `aud` may be a single string or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        }
    }
}

/// Claims as they appear in an Auth0 access token.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: String,
    pub aud: Audience,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Namespaced claims, including roles.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Authenticated caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    /// `sub` claim - redacted in Debug output.
    pub subject: String,

    /// Every audience the token was issued for.
    pub audiences: Vec<String>,

    /// `iss` claim.
    pub issuer: String,

    /// Space-separated `scope` claim, split.
    pub scopes: Vec<String>,

    /// RBAC `permissions` claim.
    pub permissions: Vec<String>,

    /// Roles read from the namespaced roles claim.
    pub roles: Vec<String>,

    /// `exp` claim (Unix epoch seconds).
    pub expires_at: i64,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("subject", &"[REDACTED]")
            .field("audiences", &self.audiences)
            .field("issuer", &self.issuer)
            .field("scopes", &self.scopes)
            .field("permissions", &self.permissions)
            .field("roles", &self.roles)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Principal {
    pub(crate) fn from_claims(claims: RawClaims, roles_claim: &str) -> Self {
        let roles = claims
            .extra
            .get(roles_claim)
            .map(extract_roles)
            .unwrap_or_default();

        Self {
            subject: claims.sub,
            audiences: claims.aud.into_vec(),
            issuer: claims.iss,
            scopes: claims
                .scope
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(ToString::to_string)
                .collect(),
            permissions: claims.permissions,
            roles,
            expires_at: claims.exp,
        }
    }

    /// Whether the token carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Scopes joined back into the wire form.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Read roles from a claim value.
///
/// Accepts a string, an array of strings, or an object whose `role` (or
/// `roles`) member is one of those.
fn extract_roles(value: &Value) -> Vec<String> {
    match value {
        Value::String(role) => vec![role.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        Value::Object(map) => map
            .get("role")
            .or_else(|| map.get("roles"))
            .filter(|inner| !inner.is_object())
            .map(extract_roles)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
