//! Health check handler.
//!
//! `/v1/health` stays 200 while the token cache's durable tier is failing:
//! the memory tier and provider still serve tokens, so the process is
//! usable but reported as degraded.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

#[tracing::instrument(skip_all, name = "admin.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let degraded = state.token_cache.is_store_degraded();
    let failures = state.token_cache.consecutive_store_write_failures();

    if degraded {
        tracing::warn!(
            target: "admin.handlers.health",
            store_write_failures = failures,
            "Token cache store tier degraded"
        );
    }

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        token_cache: if degraded { "degraded" } else { "ok" }.to_string(),
        store_write_failures: failures,
    })
}
