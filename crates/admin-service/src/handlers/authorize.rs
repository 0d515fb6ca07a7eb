//! Gateway authorizer endpoint.
//!
//! Always answers 200 with a policy document; an unreadable event is a
//! Deny like any other failure.

use crate::auth::{AuthorizerRequest, AuthorizerResponse};
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Handler for POST /authorize
#[tracing::instrument(skip_all, name = "admin.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Json<AuthorizerResponse> {
    let request: AuthorizerRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(target: "admin.handlers.authorize", error = %e, "Unreadable authorizer event");
        AuthorizerRequest::default()
    });

    Json(state.authorizer.authorize(&request).await)
}
