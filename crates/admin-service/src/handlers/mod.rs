//! HTTP request handlers for the admin service.

pub mod authorize;
pub mod favorites;
pub mod health;
pub mod metrics;
pub mod users;

pub use authorize::authorize;
pub use favorites::update_favorites;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use users::{delete_user, invite_user, list_users};

use crate::errors::AdminError;
use serde::de::DeserializeOwned;

/// Deserialize a JSON body, returning 400 (not axum's default 422) on
/// failure.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AdminError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "admin.handlers", error = %e, "Invalid request body");
        AdminError::BadRequest("Invalid request body".to_string())
    })
}
