//! Current user handler.

use crate::auth::AuthenticatedUser;
use crate::models::MeResponse;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/me
///
/// Returns the identity the auth middleware extracted from the token:
///
/// ```json
/// { "user_id": "8d3b7a52-0f8e-4c55-9e0b-2f1a6d2c4b90", "email": "alice@example.com" }
/// ```
#[instrument(skip_all, name = "org.handlers.me")]
pub async fn get_me(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_me_echoes_identity() {
        let user = AuthenticatedUser {
            user_id: "user-123".to_string(),
            email: Some("alice@example.com".to_string()),
            claims: serde_json::Map::new(),
        };

        let Json(response) = get_me(Extension(user)).await;
        assert_eq!(response.user_id, "user-123");
        assert_eq!(response.email.as_deref(), Some("alice@example.com"));
    }
}
