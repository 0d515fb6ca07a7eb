//! JWT helpers that run before any signature check.
//!
//! Inbound bearer tokens are inspected here without trusting their
//! contents: size is bounded, the header is decoded, and the `kid`/`alg`
//! pair is pulled out so the caller can pick a verification key from a
//! trusted key set. Nothing in this module validates a signature.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Error messages are generic; detail goes to debug logs only

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted JWT size in bytes (8KB).
///
/// Auth0 access tokens with namespaced role claims are typically well under
/// 2KB. Anything larger is rejected before base64 decoding.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default leeway applied to `exp`/`nbf` checks.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

/// Upper bound for configurable leeway.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

/// Authorization scheme prefix, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

// =============================================================================
// Error Types
// =============================================================================

/// Reasons a token header could not be used for key lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Not three dot-separated segments, or header is not base64url JSON.
    #[error("The access token is invalid or expired")]
    Malformed,

    /// Header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Header has no usable `alg`.
    #[error("The access token is invalid or expired")]
    MissingAlg,
}

// =============================================================================
// Header
// =============================================================================

/// The untrusted header fields needed to choose a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Key identifier, used to look the key up in a JWKS.
    pub kid: String,
    /// Algorithm name as written by the issuer (e.g. `RS256`).
    pub alg: String,
}

/// Decode a JWT header without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds the size limit
/// - `Malformed` - wrong segment count, bad base64url or bad JSON
/// - `MissingKid` / `MissingAlg` - field absent, empty, or not a string
pub fn decode_unverified_header(token: &str) -> Result<UnverifiedHeader, HeaderError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(HeaderError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: not three segments");
        return Err(HeaderError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        HeaderError::Malformed
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        HeaderError::Malformed
    })?;

    let non_empty = |field: &str| {
        header
            .get(field)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };

    let kid = non_empty("kid").ok_or(HeaderError::MissingKid)?;
    let alg = non_empty("alg").ok_or(HeaderError::MissingAlg)?;

    Ok(UnverifiedHeader { kid, alg })
}

/// Strip the `Bearer ` scheme from an Authorization value.
///
/// Returns `None` when the scheme is missing or the token part is empty.
#[must_use]
pub fn bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
