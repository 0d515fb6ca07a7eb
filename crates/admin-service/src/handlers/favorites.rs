//! `PATCH /admin-api/user/favorites` - replace a user's saved favorites.

use super::parse_body;
use crate::errors::AdminError;
use crate::models::{is_plausible_email, StandardResponse, UpdateFavoritesRequest, MAX_FAVORITES};
use crate::routes::AppState;
use axum::{extract::State, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

fn validate(request: &UpdateFavoritesRequest) -> Result<(), AdminError> {
    if !is_plausible_email(request.email.trim()) {
        return Err(AdminError::BadRequest("A valid email is required".to_string()));
    }
    if request.favorites.len() > MAX_FAVORITES {
        return Err(AdminError::BadRequest(format!(
            "At most {MAX_FAVORITES} favorites are allowed"
        )));
    }
    if request.favorites.iter().any(|f| f.trim().is_empty()) {
        return Err(AdminError::BadRequest("Favorites must not be empty".to_string()));
    }
    Ok(())
}

#[instrument(skip_all, name = "admin.users.favorites")]
pub async fn update_favorites(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<StandardResponse>, AdminError> {
    let request: UpdateFavoritesRequest = parse_body(&body)?;
    validate(&request)?;

    let user = state
        .management
        .update_user_favorites(request.email.trim(), &request.favorites)
        .await?;

    tracing::info!(
        target: "admin.handlers.favorites",
        user_id = %user.user_id,
        count = request.favorites.len(),
        "Favorites updated"
    );

    Ok(Json(
        StandardResponse::ok("Favorites updated successfully").with_data(json!({
            "user_id": user.user_id,
            "favorites": request.favorites,
        })),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(email: &str, favorites: Vec<String>) -> UpdateFavoritesRequest {
        UpdateFavoritesRequest {
            email: email.to_string(),
            favorites,
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate(&request("a@example.com", vec!["ship-1".into()])).is_ok());
        assert!(validate(&request("a@example.com", vec![])).is_ok());
        assert!(validate(&request("bad", vec![])).is_err());
        assert!(validate(&request("a@example.com", vec!["  ".into()])).is_err());
        assert!(validate(&request(
            "a@example.com",
            vec!["x".to_string(); MAX_FAVORITES + 1]
        ))
        .is_err());
    }
}
