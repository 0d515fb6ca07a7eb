//! JWT validation for inbound bearer tokens.
//!
//! Validates access tokens using public keys fetched from the tenant's JWKS
//! endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Algorithms outside the allow-list are rejected before any key lookup
//! - A JWK that pins a different algorithm than the header is rejected
//! - Expiry, not-before, audience and issuer are checked with leeway
//! - Every failure displays a generic message; the reason code is logged

use crate::auth::claims::{Principal, RawClaims};
use crate::auth::jwks::{JwksClient, JwksError};
use common::jwt::{decode_unverified_header, DEFAULT_LEEWAY};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Why a token was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("The access token is invalid or expired")]
    Malformed,

    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm(String),

    #[error("The access token is invalid or expired")]
    UnknownSigner,

    #[error("The access token is invalid or expired")]
    BadSignature,

    #[error("The access token is invalid or expired")]
    Expired,

    #[error("The access token is invalid or expired")]
    NotYetValid,

    #[error("The access token is invalid or expired")]
    AudienceMismatch,

    #[error("The access token is invalid or expired")]
    IssuerMismatch,

    #[error("Authentication service unavailable")]
    KeySetUnavailable(String),
}

impl TokenValidationError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::UnknownSigner => "unknown_signer",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::KeySetUnavailable(_) => "key_set_unavailable",
        }
    }
}

impl From<JwksError> for TokenValidationError {
    fn from(err: JwksError) -> Self {
        match err {
            JwksError::UnknownSigner => Self::UnknownSigner,
            JwksError::Unavailable(reason) => Self::KeySetUnavailable(reason),
        }
    }
}

/// What a valid token must look like.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Expected `iss`.
    pub issuer: String,
    /// Accepted audiences; the token must name at least one.
    pub audiences: Vec<String>,
    /// Accepted header algorithms.
    pub allowed_algorithms: Vec<Algorithm>,
    /// Clock leeway for `exp`/`nbf`.
    pub leeway: Duration,
    /// Claim holding roles.
    pub roles_claim: String,
}

impl ValidatorConfig {
    /// RS256 only, default leeway.
    #[must_use]
    pub fn new(issuer: impl Into<String>, audiences: Vec<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audiences,
            allowed_algorithms: vec![Algorithm::RS256],
            leeway: DEFAULT_LEEWAY,
            roles_claim: String::new(),
        }
    }

    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    #[must_use]
    pub fn with_allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    #[must_use]
    pub fn with_roles_claim(mut self, claim: impl Into<String>) -> Self {
        self.roles_claim = claim.into();
        self
    }
}

/// Inbound token validator.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    config: ValidatorConfig,
}

impl JwtValidator {
    #[must_use]
    pub fn new(jwks_client: Arc<JwksClient>, config: ValidatorConfig) -> Self {
        Self {
            jwks_client,
            config,
        }
    }

    /// Validate a bearer token and return the principal.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header decode, without trusting claims
    /// 2. Algorithm allow-list
    /// 3. Key lookup by `kid` (one refresh on miss)
    /// 4. Signature verification with the header algorithm
    /// 5. `exp`, `nbf`, `aud`, `iss` with leeway
    ///
    /// # Errors
    ///
    /// See [`TokenValidationError`].
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Principal, TokenValidationError> {
        let result = self.validate_inner(token).await;
        match &result {
            Ok(_) => tracing::debug!(target: "admin.auth.jwt", "Token validated successfully"),
            Err(e) => tracing::debug!(
                target: "admin.auth.jwt",
                reason = e.reason_code(),
                "Token validation failed"
            ),
        }
        result
    }

    async fn validate_inner(&self, token: &str) -> Result<Principal, TokenValidationError> {
        let header = decode_unverified_header(token).map_err(|e| {
            tracing::debug!(target: "admin.auth.jwt", error = ?e, "Token header rejected");
            TokenValidationError::Malformed
        })?;

        let algorithm = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| self.config.allowed_algorithms.contains(alg))
            .ok_or_else(|| TokenValidationError::UnsupportedAlgorithm(header.alg.clone()))?;

        let jwk = self.jwks_client.get_key(&header.kid).await?;

        verify_token(token, &jwk, &header.alg, algorithm, &self.config)
    }
}

/// Verify signature and claims against a located key.
fn verify_token(
    token: &str,
    jwk: &Jwk,
    header_alg: &str,
    algorithm: Algorithm,
    config: &ValidatorConfig,
) -> Result<Principal, TokenValidationError> {
    if let Some(key_alg) = &jwk.common.key_algorithm {
        let pinned = serde_json::to_value(key_alg).ok();
        if pinned.as_ref().and_then(serde_json::Value::as_str) != Some(header_alg) {
            tracing::warn!(
                target: "admin.auth.jwt",
                header_alg = %header_alg,
                "JWK algorithm does not match token header"
            );
            return Err(TokenValidationError::BadSignature);
        }
    }

    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| {
        tracing::warn!(target: "admin.auth.jwt", error = %e, "Unusable JWK");
        TokenValidationError::BadSignature
    })?;

    let mut validation = Validation::new(algorithm);
    validation.set_audience(&config.audiences);
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
    validation.leeway = config.leeway.as_secs();
    validation.validate_nbf = true;

    let token_data = decode::<RawClaims>(token, &decoding_key, &validation)
        .map_err(|e| map_decode_error(e.kind()))?;

    Ok(Principal::from_claims(
        token_data.claims,
        &config.roles_claim,
    ))
}

fn map_decode_error(kind: &ErrorKind) -> TokenValidationError {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::Crypto(_) => TokenValidationError::BadSignature,
        ErrorKind::ExpiredSignature => TokenValidationError::Expired,
        ErrorKind::ImmatureSignature => TokenValidationError::NotYetValid,
        ErrorKind::InvalidAudience => TokenValidationError::AudienceMismatch,
        ErrorKind::InvalidIssuer => TokenValidationError::IssuerMismatch,
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "aud" => TokenValidationError::AudienceMismatch,
            "iss" => TokenValidationError::IssuerMismatch,
            _ => TokenValidationError::Malformed,
        },
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenValidationError::UnsupportedAlgorithm(String::new())
        }
        _ => TokenValidationError::Malformed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use admin_test_utils::crypto_fixtures::SigningKeyFixture;
    use admin_test_utils::mock_auth0::MockIdentityProvider;
    use admin_test_utils::token_builders::{
        TestTokenBuilder, ADMIN_AUDIENCE, ROLES_CLAIM, VIEWER_AUDIENCE,
    };
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn validator_for(idp: &MockIdentityProvider) -> JwtValidator {
        let jwks = Arc::new(JwksClient::new(idp.jwks_url(), Duration::from_secs(2)));
        JwtValidator::new(
            jwks,
            ValidatorConfig::new(
                idp.issuer(),
                vec![ADMIN_AUDIENCE.to_string(), VIEWER_AUDIENCE.to_string()],
            )
            .with_roles_claim(ROLES_CLAIM),
        )
    }

    async fn setup() -> (MockIdentityProvider, SigningKeyFixture, JwtValidator) {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        idp.mount_jwks(&[&key]).await;
        let validator = validator_for(&idp);
        (idp, key, validator)
    }

    #[tokio::test]
    async fn test_valid_token_yields_principal() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .for_user("auth0|alice")
            .with_scope("read:users")
            .with_roles(&["admin"])
            .sign(&key)
            .unwrap();

        let principal = validator.validate(&token).await.unwrap();
        assert_eq!(principal.subject, "auth0|alice");
        assert_eq!(principal.audiences, vec![ADMIN_AUDIENCE.to_string()]);
        assert!(principal.has_role("admin"));
        assert!(principal.has_scope("read:users"));
    }

    #[tokio::test]
    async fn test_audience_mismatch_with_valid_signature() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_audience("https://some-other-api")
            .sign(&key)
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::AudienceMismatch);
        assert_eq!(err.reason_code(), "audience_mismatch");
        assert_eq!(err.to_string(), "The access token is invalid or expired");
    }

    #[tokio::test]
    async fn test_any_configured_audience_accepted() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_audiences(&["https://tenant/userinfo", VIEWER_AUDIENCE])
            .sign(&key)
            .unwrap();

        let principal = validator.validate(&token).await.unwrap();
        assert_eq!(principal.audiences.len(), 2);
    }

    #[tokio::test]
    async fn test_issuer_mismatch() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new("https://evil.example.com/")
            .sign(&key)
            .unwrap();
        assert!(!idp.issuer().is_empty());

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::IssuerMismatch);
    }

    #[tokio::test]
    async fn test_expired_beyond_leeway() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .expires_in(-120)
            .sign(&key)
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }

    #[tokio::test]
    async fn test_expired_within_leeway_accepted() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .expires_in(-30)
            .sign(&key)
            .unwrap();

        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_not_yet_valid() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .not_before_in(600)
            .sign(&key)
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::NotYetValid);
    }

    #[tokio::test]
    async fn test_signature_from_wrong_key() {
        let (idp, _key, validator) = setup().await;
        // Signed with the secondary key but claims the primary kid
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_kid("test-key-2024-01")
            .sign(&SigningKeyFixture::secondary())
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::BadSignature);
    }

    #[tokio::test]
    async fn test_hs256_rejected_before_key_lookup() {
        let idp = MockIdentityProvider::start().await;
        // No JWKS mounted: a lookup would fail with KeySetUnavailable
        let validator = validator_for(&idp);
        let token = TestTokenBuilder::new(&idp.issuer())
            .sign_hs256(b"shared-secret", "test-key-2024-01")
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err.reason_code(), "unsupported_algorithm");
    }

    #[tokio::test]
    async fn test_jwk_pinned_to_other_algorithm() {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/.well-known/jwks.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "keys": [key.jwk_with_alg("RS512")] }),
            ))
            .mount(idp.server())
            .await;
        let validator = validator_for(&idp);

        let token = TestTokenBuilder::new(&idp.issuer()).sign(&key).unwrap();
        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::BadSignature);
    }

    #[tokio::test]
    async fn test_unknown_kid_is_unknown_signer() {
        let (idp, key, validator) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_kid("retired-key")
            .sign(&key)
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::UnknownSigner);
    }

    #[tokio::test]
    async fn test_key_set_unavailable() {
        let idp = MockIdentityProvider::start().await;
        let validator = validator_for(&idp);
        let token = TestTokenBuilder::new(&idp.issuer())
            .sign(&SigningKeyFixture::primary())
            .unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, TokenValidationError::KeySetUnavailable(_)));
        assert_eq!(err.to_string(), "Authentication service unavailable");
    }

    #[tokio::test]
    async fn test_malformed_tokens() {
        let (_idp, _key, validator) = setup().await;

        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.payload.sig"] {
            let err = validator.validate(token).await.unwrap_err();
            assert_eq!(err, TokenValidationError::Malformed, "token: {token:?}");
        }

        let oversized = "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            validator.validate(&oversized).await.unwrap_err(),
            TokenValidationError::Malformed
        );

        let no_kid = format!(
            "{}.e30.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#)
        );
        assert_eq!(
            validator.validate(&no_kid).await.unwrap_err(),
            TokenValidationError::Malformed
        );
    }

    #[tokio::test]
    async fn test_missing_subject_rejected() {
        let (idp, key, validator) = setup().await;
        let mut claims = TestTokenBuilder::new(&idp.issuer()).claims();
        claims.as_object_mut().unwrap().remove("sub");

        let mut header = jsonwebtoken::Header::new(Algorithm::RS256);
        header.kid = Some(key.kid().to_string());
        let token =
            jsonwebtoken::encode(&header, &claims, &key.encoding_key().unwrap()).unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::Malformed);
    }

    #[tokio::test]
    async fn test_missing_expiry_is_malformed_not_expired() {
        let (idp, key, validator) = setup().await;
        let mut claims = TestTokenBuilder::new(&idp.issuer()).claims();
        claims.as_object_mut().unwrap().remove("exp");

        let mut header = jsonwebtoken::Header::new(Algorithm::RS256);
        header.kid = Some(key.kid().to_string());
        let token =
            jsonwebtoken::encode(&header, &claims, &key.encoding_key().unwrap()).unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationError::Malformed);
    }

    #[test]
    fn test_missing_required_claim_mapping() {
        let missing = |claim: &str| {
            map_decode_error(&ErrorKind::MissingRequiredClaim(claim.to_string()))
        };
        assert_eq!(missing("exp"), TokenValidationError::Malformed);
        assert_eq!(missing("sub"), TokenValidationError::Malformed);
        assert_eq!(missing("aud"), TokenValidationError::AudienceMismatch);
        assert_eq!(missing("iss"), TokenValidationError::IssuerMismatch);
    }

    #[test]
    fn test_reason_codes_are_distinct() {
        let all = [
            TokenValidationError::Malformed,
            TokenValidationError::UnsupportedAlgorithm("HS256".into()),
            TokenValidationError::UnknownSigner,
            TokenValidationError::BadSignature,
            TokenValidationError::Expired,
            TokenValidationError::NotYetValid,
            TokenValidationError::AudienceMismatch,
            TokenValidationError::IssuerMismatch,
            TokenValidationError::KeySetUnavailable("down".into()),
        ];
        let mut codes: Vec<_> = all.iter().map(TokenValidationError::reason_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
