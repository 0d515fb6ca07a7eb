//! Admin service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; the actual cause is logged
//! server-side.

use crate::auth::TokenValidationError;
use crate::services::ManagementError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Admin service error type.
///
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - BadRequest: 400 Bad Request
/// - Conflict: 409 Conflict
/// - ServiceUnavailable: 503 Service Unavailable
/// - Upstream: 502 Bad Gateway
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AdminError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::InvalidToken(_) => 401,
            AdminError::Forbidden(_) => 403,
            AdminError::NotFound(_) => 404,
            AdminError::BadRequest(_) => 400,
            AdminError::Conflict(_) => 409,
            AdminError::ServiceUnavailable(_) => 503,
            AdminError::Upstream(_) => 502,
            AdminError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AdminError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            AdminError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            AdminError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            AdminError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            AdminError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            AdminError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "admin.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            AdminError::Upstream(reason) => {
                tracing::error!(target: "admin.upstream", reason = %reason, "Upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The identity provider request failed".to_string(),
                )
            }
            AdminError::Internal(reason) => {
                tracing::error!(target: "admin.internal", reason = %reason, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"cruise-admin-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<TokenValidationError> for AdminError {
    fn from(err: TokenValidationError) -> Self {
        match err {
            TokenValidationError::KeySetUnavailable(_) => {
                AdminError::ServiceUnavailable(format!("key set unavailable: {}", err.reason_code()))
            }
            other => AdminError::InvalidToken(other.to_string()),
        }
    }
}

impl From<ManagementError> for AdminError {
    fn from(err: ManagementError) -> Self {
        match err {
            ManagementError::NotFound(what) => AdminError::NotFound(what),
            ManagementError::Conflict(what) => AdminError::Conflict(what),
            ManagementError::InvalidRequest(what) => AdminError::BadRequest(what),
            ManagementError::Token(e) => AdminError::ServiceUnavailable(e.to_string()),
            ManagementError::Configuration(e) => AdminError::Internal(e),
            other => AdminError::Upstream(other.to_string()),
        }
    }
}

/// Failures while assembling the service at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Credential error: {0}")]
    Credentials(#[from] common::credentials::CredentialError),

    #[error("Token cache error: {0}")]
    TokenCache(#[from] common::token_cache::TokenCacheError),

    #[error("Management client error: {0}")]
    Management(#[from] ManagementError),

    #[error("Metrics error: {0}")]
    Metrics(String),
}
