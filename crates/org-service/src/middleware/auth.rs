//! Authentication middleware for protected routes.
//!
//! Reads the raw `Authorization` header, hands it to the [`TokenVerifier`]
//! and injects the resulting [`AuthenticatedUser`] into request extensions.
//! Handlers behind this layer take `Extension<AuthenticatedUser>`.

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::errors::OrgError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with its key-set cache.
    pub verifier: Arc<TokenVerifier>,
}

/// Authentication middleware for user tokens.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or invalid
/// - 500 if the token needs a verification path that is not configured
/// - 502 if the key set cannot be fetched
/// - Otherwise continues with `AuthenticatedUser` in extensions
#[instrument(skip_all, name = "org.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, OrgError> {
    // Non-ASCII header values are treated like a missing header
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let user = state.verifier.authenticate(authorization).await.map_err(|e| {
        tracing::debug!(target: "org.middleware.auth", error = %e, "Request rejected");
        OrgError::Auth(e)
    })?;

    req.extensions_mut().insert::<AuthenticatedUser>(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{KeySet, KeySetSource};
    use crate::auth::JwksClient;
    use crate::errors::AuthError;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use secrecy::SecretString;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret";

    struct EmptyKeySet;

    #[async_trait]
    impl KeySetSource for EmptyKeySet {
        async fn fetch(&self) -> Result<KeySet, AuthError> {
            Ok(KeySet { keys: Vec::new() })
        }
    }

    async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> String {
        user.user_id
    }

    fn app() -> Router {
        let jwks = Arc::new(JwksClient::with_source(
            Arc::new(EmptyKeySet),
            Duration::from_secs(60),
        ));
        let verifier = TokenVerifier::new(jwks, Duration::from_secs(300))
            .with_shared_secret(Some(SecretString::from(SECRET)));
        let state = Arc::new(AuthState {
            verifier: Arc::new(verifier),
        });

        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state, require_auth))
    }

    fn request(authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "user-123", "exp": chrono::Utc::now().timestamp() + 600}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let response = app()
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(body.as_ref(), b"user-123");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app().oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("WWW-Authenticate"));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_unauthorized() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","kid":"nope"}"#);
        let token = format!("{header}.e30.c2ln");

        let response = app()
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
