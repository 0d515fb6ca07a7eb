//! API gateway token authorizer.
//!
//! Turns an authorizer request (`Bearer <jwt>` plus the invoked method ARN)
//! into an IAM-style policy document. Any failure yields a Deny; the
//! specific reason is logged, never returned.

use crate::auth::{AudiencePolicy, JwtValidator};
use crate::observability::metrics::record_token_validation;
use common::jwt::bearer_token;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

const POLICY_VERSION: &str = "2012-10-17";
const INVOKE_ACTION: &str = "execute-api:Invoke";
const DENY_PRINCIPAL: &str = "unauthorized";

/// Inbound authorizer event.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizerRequest {
    #[serde(rename = "type", default)]
    pub request_type: Option<String>,

    #[serde(rename = "authorizationToken", default)]
    pub authorization_token: Option<String>,

    #[serde(rename = "methodArn", default)]
    pub method_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// Authorizer decision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

impl AuthorizerResponse {
    fn new(principal_id: String, effect: Effect, resource: String) -> Self {
        Self {
            principal_id,
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    action: INVOKE_ACTION.to_string(),
                    effect,
                    resource,
                }],
            },
            context: None,
        }
    }

    fn deny(method_arn: Option<&str>) -> Self {
        Self::new(
            DENY_PRINCIPAL.to_string(),
            Effect::Deny,
            method_arn.unwrap_or("*").to_string(),
        )
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.policy_document
            .statement
            .iter()
            .all(|s| s.effect == Effect::Allow)
    }
}

/// Replace the last path segment of a method ARN with `*` so the policy
/// covers sibling resources on the same stage.
fn wildcard_resource(method_arn: &str) -> String {
    match method_arn.rsplit_once('/') {
        Some((prefix, _)) => format!("{prefix}/*"),
        None => method_arn.to_string(),
    }
}

/// Validates the token, then applies the audience policy.
pub struct GatewayAuthorizer {
    validator: Arc<JwtValidator>,
    policy: AudiencePolicy,
}

impl GatewayAuthorizer {
    #[must_use]
    pub fn new(validator: Arc<JwtValidator>, policy: AudiencePolicy) -> Self {
        Self { validator, policy }
    }

    #[instrument(skip_all)]
    pub async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerResponse {
        let method_arn = request.method_arn.as_deref();

        let Some(token) = request
            .authorization_token
            .as_deref()
            .and_then(bearer_token)
        else {
            tracing::info!(target: "admin.auth.authorizer", reason = "missing_token", "Denied");
            record_token_validation("deny");
            return AuthorizerResponse::deny(method_arn);
        };

        let principal = match self.validator.validate(token).await {
            Ok(principal) => principal,
            Err(e) => {
                tracing::info!(
                    target: "admin.auth.authorizer",
                    reason = e.reason_code(),
                    "Denied"
                );
                record_token_validation(e.reason_code());
                return AuthorizerResponse::deny(method_arn);
            }
        };

        let audience = match self.policy.evaluate(&principal) {
            Ok(audience) => audience,
            Err(denial) => {
                tracing::info!(
                    target: "admin.auth.authorizer",
                    reason = denial.reason_code(),
                    "Denied"
                );
                record_token_validation("deny");
                return AuthorizerResponse::deny(method_arn);
            }
        };

        let Some(method_arn) = method_arn else {
            tracing::info!(target: "admin.auth.authorizer", reason = "missing_method_arn", "Denied");
            record_token_validation("deny");
            return AuthorizerResponse::deny(None);
        };

        tracing::info!(target: "admin.auth.authorizer", audience = %audience, "Allowed");
        record_token_validation("allow");

        let mut response = AuthorizerResponse::new(
            principal.subject.clone(),
            Effect::Allow,
            wildcard_resource(method_arn),
        );
        response.context = Some(HashMap::from([
            ("sub".to_string(), principal.subject.clone()),
            ("scope".to_string(), principal.scope_string()),
            ("roles".to_string(), principal.roles.join(" ")),
        ]));
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{JwksClient, ValidatorConfig};
    use admin_test_utils::crypto_fixtures::SigningKeyFixture;
    use admin_test_utils::mock_auth0::MockIdentityProvider;
    use admin_test_utils::token_builders::{
        TestTokenBuilder, ADMIN_AUDIENCE, ROLES_CLAIM, VIEWER_AUDIENCE,
    };
    use std::time::Duration;

    const ARN: &str = "arn:aws:execute-api:us-west-2:123456789012:abc123/prod/GET/admin-api/users";

    async fn setup() -> (MockIdentityProvider, SigningKeyFixture, GatewayAuthorizer) {
        let idp = MockIdentityProvider::start().await;
        let key = SigningKeyFixture::primary();
        idp.mount_jwks(&[&key]).await;

        let jwks = Arc::new(JwksClient::new(idp.jwks_url(), Duration::from_secs(2)));
        let validator = Arc::new(JwtValidator::new(
            jwks,
            ValidatorConfig::new(
                idp.issuer(),
                vec![ADMIN_AUDIENCE.to_string(), VIEWER_AUDIENCE.to_string()],
            )
            .with_roles_claim(ROLES_CLAIM),
        ));
        let authorizer = GatewayAuthorizer::new(
            validator,
            AudiencePolicy::gateway(ADMIN_AUDIENCE, "admin", VIEWER_AUDIENCE),
        );
        (idp, key, authorizer)
    }

    fn request(token: Option<String>, arn: Option<&str>) -> AuthorizerRequest {
        AuthorizerRequest {
            request_type: Some("TOKEN".to_string()),
            authorization_token: token,
            method_arn: arn.map(ToString::to_string),
        }
    }

    #[test]
    fn test_wildcard_resource() {
        assert_eq!(
            wildcard_resource(ARN),
            "arn:aws:execute-api:us-west-2:123456789012:abc123/prod/GET/admin-api/*"
        );
        assert_eq!(wildcard_resource("no-slash"), "no-slash");
    }

    #[tokio::test]
    async fn test_admin_with_role_allowed() {
        let (idp, key, authorizer) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .for_user("auth0|admin-user")
            .with_scope("read:users")
            .with_roles(&["admin", "viewer"])
            .sign(&key)
            .unwrap();

        let response = authorizer
            .authorize(&request(Some(format!("Bearer {token}")), Some(ARN)))
            .await;

        assert!(response.is_allowed());
        assert_eq!(response.principal_id, "auth0|admin-user");
        let statement = &response.policy_document.statement[0];
        assert_eq!(statement.action, "execute-api:Invoke");
        assert!(statement.resource.ends_with("/admin-api/*"));

        let context = response.context.unwrap();
        assert_eq!(context["sub"], "auth0|admin-user");
        assert_eq!(context["scope"], "read:users");
        assert_eq!(context["roles"], "admin viewer");
    }

    #[tokio::test]
    async fn test_admin_audience_without_role_denied() {
        let (idp, key, authorizer) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_roles(&["viewer"])
            .sign(&key)
            .unwrap();

        let response = authorizer
            .authorize(&request(Some(format!("Bearer {token}")), Some(ARN)))
            .await;

        assert!(!response.is_allowed());
        assert_eq!(response.principal_id, "unauthorized");
        assert_eq!(response.policy_document.statement[0].resource, ARN);
        assert!(response.context.is_none());
    }

    #[tokio::test]
    async fn test_viewer_audience_allowed_without_roles() {
        let (idp, key, authorizer) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_audience(VIEWER_AUDIENCE)
            .sign(&key)
            .unwrap();

        let response = authorizer
            .authorize(&request(Some(format!("Bearer {token}")), Some(ARN)))
            .await;
        assert!(response.is_allowed());
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_denied() {
        let (_idp, _key, authorizer) = setup().await;

        let response = authorizer.authorize(&request(None, Some(ARN))).await;
        assert!(!response.is_allowed());

        let response = authorizer
            .authorize(&request(Some("Basic dXNlcjpwYXNz".to_string()), Some(ARN)))
            .await;
        assert!(!response.is_allowed());

        let response = authorizer
            .authorize(&request(Some("Bearer ".to_string()), None))
            .await;
        assert_eq!(response.policy_document.statement[0].resource, "*");
    }

    #[tokio::test]
    async fn test_expired_token_denied() {
        let (idp, key, authorizer) = setup().await;
        let token = TestTokenBuilder::new(&idp.issuer())
            .with_roles(&["admin"])
            .expires_in(-3600)
            .sign(&key)
            .unwrap();

        let response = authorizer
            .authorize(&request(Some(format!("Bearer {token}")), Some(ARN)))
            .await;
        assert!(!response.is_allowed());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = AuthorizerResponse::deny(None);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["principalId"], "unauthorized");
        assert_eq!(json["policyDocument"]["Version"], "2012-10-17");
        assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
        assert_eq!(json["policyDocument"]["Statement"][0]["Resource"], "*");
        assert_eq!(
            json["policyDocument"]["Statement"][0]["Action"],
            "execute-api:Invoke"
        );
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_request_wire_shape() {
        let request: AuthorizerRequest = serde_json::from_value(serde_json::json!({
            "type": "TOKEN",
            "authorizationToken": "Bearer abc",
            "methodArn": ARN,
        }))
        .unwrap();

        assert_eq!(request.request_type.as_deref(), Some("TOKEN"));
        assert_eq!(request.authorization_token.as_deref(), Some("Bearer abc"));
        assert_eq!(request.method_arn.as_deref(), Some(ARN));
    }
}
