//! Admin authentication middleware.
//!
//! Validates the bearer token, applies the admin-only audience policy and
//! puts the [`Principal`](crate::auth::Principal) into request extensions.
//!
//! - Missing or invalid token: 401
//! - Valid token, policy denied: 403
//! - Key set unreachable: 503

use crate::auth::{AudiencePolicy, JwtValidator};
use crate::errors::AdminError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::bearer_token;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<JwtValidator>,
    pub policy: AudiencePolicy,
}

fn extract_bearer_token(req: &Request) -> Result<&str, AdminError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "admin.middleware.auth", "Missing Authorization header");
            AdminError::InvalidToken("Missing Authorization header".to_string())
        })?;

    bearer_token(header).ok_or_else(|| {
        tracing::debug!(target: "admin.middleware.auth", "Invalid Authorization header format");
        AdminError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

#[instrument(skip_all, name = "admin.middleware.auth")]
pub async fn require_admin(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AdminError> {
    let token = extract_bearer_token(&req)?;

    let principal = state.validator.validate(token).await.map_err(|e| {
        tracing::info!(
            target: "admin.middleware.auth",
            reason = e.reason_code(),
            "Rejected admin request"
        );
        AdminError::from(e)
    })?;

    if let Err(denial) = state.policy.evaluate(&principal) {
        tracing::info!(
            target: "admin.middleware.auth",
            reason = denial.reason_code(),
            "Admin access denied"
        );
        return Err(AdminError::Forbidden("Admin access required".to_string()));
    }

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{JwksClient, Principal, ValidatorConfig};
    use admin_test_utils::crypto_fixtures::SigningKeyFixture;
    use admin_test_utils::mock_auth0::MockIdentityProvider;
    use admin_test_utils::token_builders::{
        TestTokenBuilder, ADMIN_AUDIENCE, ROLES_CLAIM, VIEWER_AUDIENCE,
    };
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    async fn whoami(Extension(principal): Extension<Principal>) -> String {
        principal.subject
    }

    fn app(jwks_url: String, issuer: String) -> Router {
        let jwks = Arc::new(JwksClient::new(jwks_url, Duration::from_secs(2)));
        let validator = Arc::new(JwtValidator::new(
            jwks,
            ValidatorConfig::new(
                issuer,
                vec![ADMIN_AUDIENCE.to_string(), VIEWER_AUDIENCE.to_string()],
            )
            .with_roles_claim(ROLES_CLAIM),
        ));
        let state = Arc::new(AuthState {
            validator,
            policy: AudiencePolicy::admin_only(ADMIN_AUDIENCE, "admin"),
        });
        Router::new()
            .route("/admin-api/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(state, require_admin))
    }

    fn request(authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/admin-api/whoami");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_admin_token_reaches_handler() {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        idp.mount_jwks(&[&key]).await;

        let token = TestTokenBuilder::new(&idp.issuer())
            .for_user("auth0|root")
            .with_roles(&["admin"])
            .sign(&key)
            .unwrap();

        let response = app(idp.jwks_url(), idp.issuer())
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let idp = MockIdentityProvider::start().await;
        let response = app(idp.jwks_url(), idp.issuer())
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("WWW-Authenticate"));
    }

    #[tokio::test]
    async fn test_viewer_token_is_403() {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        idp.mount_jwks(&[&key]).await;

        let token = TestTokenBuilder::new(&idp.issuer())
            .with_audience(VIEWER_AUDIENCE)
            .with_roles(&["admin"])
            .sign(&key)
            .unwrap();

        let response = app(idp.jwks_url(), idp.issuer())
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_audience_without_role_is_403() {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        idp.mount_jwks(&[&key]).await;

        let token = TestTokenBuilder::new(&idp.issuer())
            .with_roles(&["viewer"])
            .sign(&key)
            .unwrap();

        let response = app(idp.jwks_url(), idp.issuer())
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unreachable_key_set_is_503() {
        let key = SigningKeyFixture::primary();
        let token = TestTokenBuilder::new("https://tenant.example.com/")
            .with_roles(&["admin"])
            .sign(&key)
            .unwrap();

        let response = app(
            "http://127.0.0.1:1/.well-known/jwks.json".to_string(),
            "https://tenant.example.com/".to_string(),
        )
        .oneshot(request(Some(&format!("Bearer {token}"))))
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
