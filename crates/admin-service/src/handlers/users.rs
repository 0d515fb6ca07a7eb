//! User administration handlers.
//!
//! - `GET /admin-api/users` - List every user
//! - `POST /admin-api/users` - Invite a user (create + password email)
//! - `DELETE /admin-api/users` - Delete a user by email
//!
//! All routes sit behind `require_admin`.

use super::parse_body;
use crate::auth::Principal;
use crate::errors::AdminError;
use crate::models::{
    is_plausible_email, is_valid_name, DeleteUserRequest, InviteUserRequest, StandardResponse,
};
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

fn require_email(email: &str) -> Result<String, AdminError> {
    let email = email.trim();
    if is_plausible_email(email) {
        Ok(email.to_string())
    } else {
        Err(AdminError::BadRequest("A valid email is required".to_string()))
    }
}

/// Handler for GET /admin-api/users
#[instrument(skip_all, name = "admin.users.list")]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StandardResponse>, AdminError> {
    let users = state.management.list_users().await?;
    let count = users.len();

    Ok(Json(
        StandardResponse::ok(format!("Retrieved {count} users"))
            .with_data(json!({ "users": users })),
    ))
}

/// Handler for POST /admin-api/users
///
/// # Response
///
/// - 201 Created: user created and password email requested
/// - 200 OK: a user with this email already exists
/// - 400 Bad Request: missing or invalid fields
#[instrument(skip_all, name = "admin.users.invite")]
pub async fn invite_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<StandardResponse>), AdminError> {
    let request: InviteUserRequest = parse_body(&body)?;
    let email = require_email(&request.email)?;
    if !is_valid_name(&request.given_name) || !is_valid_name(&request.family_name) {
        return Err(AdminError::BadRequest(
            "given_name and family_name are required".to_string(),
        ));
    }

    if let Some(existing) = state.management.find_user(&email).await? {
        info!(
            target: "admin.handlers.users",
            user_id = %existing.user_id,
            "Invite skipped, user already exists"
        );
        return Ok((
            StatusCode::OK,
            Json(
                StandardResponse::ok("User already exists")
                    .with_data(json!({ "user_id": existing.user_id })),
            ),
        ));
    }

    let user = state
        .management
        .create_user(
            &email,
            request.given_name.trim(),
            request.family_name.trim(),
        )
        .await?;

    let reset_sent = match state.management.send_password_reset_email(&email).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                target: "admin.handlers.users",
                user_id = %user.user_id,
                error = %e,
                "User created but password email failed"
            );
            false
        }
    };

    info!(
        target: "admin.handlers.users",
        user_id = %user.user_id,
        invited_by = %principal.subject,
        reset_sent = reset_sent,
        "User invited"
    );

    Ok((
        StatusCode::CREATED,
        Json(
            StandardResponse::ok("User invited successfully").with_data(json!({
                "user_id": user.user_id,
                "password_reset_sent": reset_sent,
            })),
        ),
    ))
}

/// Handler for DELETE /admin-api/users
#[instrument(skip_all, name = "admin.users.delete")]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: axum::body::Bytes,
) -> Result<Json<StandardResponse>, AdminError> {
    let request: DeleteUserRequest = parse_body(&body)?;
    let email = require_email(&request.email)?;

    let user = state
        .management
        .find_user(&email)
        .await?
        .ok_or_else(|| AdminError::NotFound("User not found".to_string()))?;

    state.management.delete_user(&user.user_id).await?;

    info!(
        target: "admin.handlers.users",
        user_id = %user.user_id,
        deleted_by = %principal.subject,
        "User deleted"
    );

    Ok(Json(
        StandardResponse::ok("User deleted successfully")
            .with_data(json!({ "user_id": user.user_id })),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_require_email_trims() {
        assert_eq!(
            require_email("  alice@example.com ").unwrap(),
            "alice@example.com"
        );
        assert!(matches!(
            require_email("not-an-email"),
            Err(AdminError::BadRequest(_))
        ));
    }

    #[test]
    fn test_parse_body_rejects_missing_fields() {
        let result: Result<InviteUserRequest, _> = parse_body(br#"{"email":"a@b.co"}"#);
        assert!(matches!(result, Err(AdminError::BadRequest(_))));

        let result: Result<DeleteUserRequest, _> = parse_body(b"not json");
        assert!(matches!(result, Err(AdminError::BadRequest(_))));
    }
}
