//! Deterministic cryptographic fixtures for testing
//!
//! Two fixed RSA-2048 keypairs, each with the base64url modulus needed to
//! publish it as a JWK. The same fixture always yields the same key, so
//! tokens and key sets are reproducible across runs.

use jsonwebtoken::EncodingKey;
use serde_json::{json, Value};
use thiserror::Error;

/// Public exponent shared by both fixtures (65537).
pub const RSA_EXPONENT: &str = "AQAB";

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// A fixed RSA signing key and its JWK identity.
#[derive(Debug, Clone)]
pub struct SigningKeyFixture {
    kid: String,
    private_pem: &'static str,
    modulus: &'static str,
}

impl SigningKeyFixture {
    /// The key a tenant is signing with today.
    pub fn primary() -> Self {
        Self {
            kid: "test-key-2024-01".to_string(),
            private_pem: include_str!("../fixtures/signing-key-1.pem"),
            modulus: include_str!("../fixtures/signing-key-1.n"),
        }
    }

    /// A second key, used for rotation and wrong-key tests.
    pub fn secondary() -> Self {
        Self {
            kid: "test-key-2024-02".to_string(),
            private_pem: include_str!("../fixtures/signing-key-2.pem"),
            modulus: include_str!("../fixtures/signing-key-2.n"),
        }
    }

    /// Same key material published under another `kid`.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Private key for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> Result<EncodingKey, FixtureError> {
        EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .map_err(|e| FixtureError::Crypto(format!("Failed to load test RSA key: {e}")))
    }

    /// Public JWK advertising `RS256`.
    pub fn jwk(&self) -> Value {
        self.jwk_with_alg("RS256")
    }

    /// Public JWK advertising `alg`.
    pub fn jwk_with_alg(&self, alg: &str) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": alg,
            "n": self.modulus.trim(),
            "e": RSA_EXPONENT,
        })
    }
}

/// `{"keys": [...]}` for the given fixtures.
pub fn jwks_json(keys: &[&SigningKeyFixture]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_distinct() {
        let a = SigningKeyFixture::primary();
        let b = SigningKeyFixture::secondary();
        assert_ne!(a.kid(), b.kid());
        assert_ne!(a.jwk()["n"], b.jwk()["n"]);
    }

    #[test]
    fn test_encoding_keys_load() {
        assert!(SigningKeyFixture::primary().encoding_key().is_ok());
        assert!(SigningKeyFixture::secondary().encoding_key().is_ok());
    }

    #[test]
    fn test_jwk_shape() {
        let jwk = SigningKeyFixture::primary().with_kid("custom").jwk();
        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], "custom");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["e"], RSA_EXPONENT);
        assert_eq!(jwk["n"].as_str().unwrap().len(), 342);
    }

    #[test]
    fn test_jwks_json_lists_keys() {
        let a = SigningKeyFixture::primary();
        let b = SigningKeyFixture::secondary();
        let set = jwks_json(&[&a, &b]);
        assert_eq!(set["keys"].as_array().unwrap().len(), 2);
    }
}
