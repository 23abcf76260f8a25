//! HTTP routes for the organization service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, TokenVerifier};
use crate::config::Config;
use crate::handlers;
use crate::middleware::auth::{require_auth, AuthState};
use crate::middleware::http_metrics::http_metrics_middleware;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,
}

/// Build the token verifier described by `config`.
///
/// The verifier owns the process-wide key-set cache, so build it once.
pub fn build_verifier(config: &Config) -> TokenVerifier {
    let jwks_client = Arc::new(JwksClient::new(
        config.jwks_url.clone(),
        config.api_key.clone(),
        config.jwks_cache_ttl,
    ));

    TokenVerifier::new(jwks_client, config.jwt_clock_skew)
        .with_shared_secret(config.jwt_secret.clone())
        .with_expected_audience(config.expected_audience.clone())
        .with_expected_issuer(config.expected_issuer.clone())
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (checks DB + key-set config) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/db-check` - Database round trip - public
/// - `/api/me` - Current user - authenticated
/// - `/api/organizations[/{id}]` - Organization CRUD - authenticated
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::new(build_verifier(&state.config)),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/db-check", get(handlers::db_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/me", get(handlers::get_me))
        .route(
            "/api/organizations",
            get(handlers::list_organizations).post(handlers::create_organization),
        )
        .route(
            "/api/organizations/:id",
            get(handlers::get_organization)
                .put(handlers::update_organization)
                .delete(handlers::delete_organization),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (last added runs first):
    // 1. http_metrics_middleware - Record ALL responses, including 404/405 (outermost)
    // 2. TimeoutLayer - 30 second budget for the whole request
    // 3. TraceLayer - Log request details (innermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
