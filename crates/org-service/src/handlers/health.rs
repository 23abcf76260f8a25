//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the database and key-set configuration
//! - `/api/db-check`: Database round-trip check

use crate::errors::OrgError;
use crate::models::{DbCheckResponse, ReadinessResponse};
use crate::repositories::OrganizationsRepository;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the service can handle traffic, 503 otherwise.
///
/// ## Checks
///
/// 1. Database connectivity - can execute simple query
/// 2. Key-set endpoint configured - keys are fetched lazily on first use
///
/// Error messages are generic; details are logged server-side.
#[tracing::instrument(skip_all, name = "org.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = OrganizationsRepository::ping(&state.pool).await {
        tracing::warn!(target: "org.health", error = %e, "Readiness check failed: database error");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: Some("unhealthy"),
                key_set: None,
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    if state.config.jwks_url.is_empty() {
        tracing::warn!(target: "org.health", "Readiness check failed: key-set URL not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: Some("healthy"),
                key_set: Some("unconfigured"),
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            database: Some("healthy"),
            key_set: Some("configured"),
            error: None,
        }),
    )
}

/// Handler for GET /api/db-check
///
/// Runs `SELECT 1` and echoes the result. Any database failure is a 500.
#[tracing::instrument(skip_all, name = "org.health.db_check")]
pub async fn db_check(State(state): State<Arc<AppState>>) -> Result<Json<DbCheckResponse>, OrgError> {
    let value = OrganizationsRepository::ping(&state.pool).await?;

    Ok(Json(DbCheckResponse {
        status: "ok",
        db_response: value,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[test]
    fn test_readiness_response_serialization() {
        let ready = ReadinessResponse {
            status: "ready",
            database: Some("healthy"),
            key_set: Some("configured"),
            error: None,
        };

        let json = serde_json::to_string(&ready).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        assert!(json.contains("\"key_set\":\"configured\""));
        assert!(!json.contains("\"error\""));

        let not_ready = ReadinessResponse {
            status: "not_ready",
            database: Some("unhealthy"),
            key_set: None,
            error: Some("Service dependencies unavailable".to_string()),
        };

        let json = serde_json::to_string(&not_ready).unwrap();
        assert!(json.contains("\"database\":\"unhealthy\""));
        assert!(!json.contains("\"key_set\""));
    }

    #[test]
    fn test_db_check_response_shape() {
        let json = serde_json::to_value(DbCheckResponse {
            status: "ok",
            db_response: 1,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "db_response": 1}));
    }
}
