//! Builder patterns for test tokens
//!
//! Produces Auth0-shaped access tokens signed with the fixture keys.

use crate::crypto_fixtures::{FixtureError, SigningKeyFixture};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Audience that requires the admin role.
pub const ADMIN_AUDIENCE: &str = "https://cruise-admin-api";

/// Audience open to any authenticated user.
pub const VIEWER_AUDIENCE: &str = "https://cruise-viewer-api";

/// Namespaced roles claim.
pub const ROLES_CLAIM: &str = "https://cruise-viewer.app/roles";

/// Builder for signed test access tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new("https://tenant.auth0.com/")
///     .for_user("auth0|alice")
///     .with_audience(ADMIN_AUDIENCE)
///     .with_roles(&["admin"])
///     .expires_in(3600)
///     .sign(&SigningKeyFixture::primary())?;
/// ```
pub struct TestTokenBuilder {
    sub: String,
    iss: String,
    aud: Value,
    scope: String,
    exp: i64,
    iat: i64,
    nbf: Option<i64>,
    roles: Option<Value>,
    kid: Option<String>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder for `issuer` with defaults
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: "auth0|test-subject".to_string(),
            iss: issuer.to_string(),
            aud: json!(ADMIN_AUDIENCE),
            scope: String::new(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            roles: None,
            kid: None,
            extra: Map::new(),
        }
    }

    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Single-string `aud`
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = json!(audience);
        self
    }

    /// Array `aud`
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Roles in the `{ "role": [...] }` shape Auth0 actions emit
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = Some(json!({ "role": roles }));
        self
    }

    /// Raw roles claim value
    pub fn with_roles_claim(mut self, value: Value) -> Self {
        self.roles = Some(value);
        self
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set `nbf` in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Header `kid` different from the signing key's
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Arbitrary extra claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        let mut claims = json!({
            "sub": self.sub,
            "iss": self.iss,
            "aud": self.aud,
            "exp": self.exp,
            "iat": self.iat,
        });
        if let Some(obj) = claims.as_object_mut() {
            if !self.scope.is_empty() {
                obj.insert("scope".to_string(), json!(self.scope));
            }
            if let Some(nbf) = self.nbf {
                obj.insert("nbf".to_string(), json!(nbf));
            }
            if let Some(roles) = &self.roles {
                obj.insert(ROLES_CLAIM.to_string(), roles.clone());
            }
            for (k, v) in &self.extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        claims
    }

    /// Sign with `key` using RS256
    pub fn sign(&self, key: &SigningKeyFixture) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone().unwrap_or_else(|| key.kid().to_string()));
        encode(&header, &self.claims(), &key.encoding_key()?)
            .map_err(|e| FixtureError::Crypto(format!("Failed to sign test token: {e}")))
    }

    /// Sign with a shared secret using HS256 (algorithm-confusion tests)
    pub fn sign_hs256(&self, secret: &[u8], kid: &str) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &self.claims(), &EncodingKey::from_secret(secret))
            .map_err(|e| FixtureError::Crypto(format!("Failed to sign test token: {e}")))
    }
}
