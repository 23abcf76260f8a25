//! Organization service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients never carry internal details; database
//! and upstream failures are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
const AUTH_REALM: &str = "Bearer realm=\"organization-api\", error=\"invalid_token\"";

/// Reasons a bearer token can be rejected.
///
/// Every variant is returned to the caller as-is; the verifier's only local
/// recovery is the single forced key-set refresh on an unknown key id.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing or invalid Authorization header")]
    MissingOrMalformedCredential,

    #[error("Invalid token header")]
    MalformedToken,

    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("Token verification is not configured for this algorithm")]
    ServerMisconfigured,

    #[error("Signing key not found for token")]
    UnknownSigningKey,

    #[error("Failed to fetch signing keys")]
    KeySetUnavailable,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token issued in the future")]
    IssuedInFuture,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Token missing subject claim")]
    MissingSubject,

    /// The subject is present but is not a user id this service can own
    /// records under.
    #[error("Token subject is not a valid user id")]
    InvalidSubject,
}

impl AuthError {
    /// Stable machine-readable code, also used as the metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingOrMalformedCredential => "MISSING_CREDENTIALS",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::UnsupportedAlgorithm => "UNSUPPORTED_ALGORITHM",
            AuthError::ServerMisconfigured => "SERVER_MISCONFIGURED",
            AuthError::UnknownSigningKey => "UNKNOWN_SIGNING_KEY",
            AuthError::KeySetUnavailable => "KEY_SET_UNAVAILABLE",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::IssuedInFuture => "TOKEN_ISSUED_IN_FUTURE",
            AuthError::InvalidAudience => "INVALID_AUDIENCE",
            AuthError::InvalidIssuer => "INVALID_ISSUER",
            AuthError::MissingSubject => "MISSING_SUBJECT",
            AuthError::InvalidSubject => "INVALID_SUBJECT",
        }
    }

    /// HTTP status for this failure.
    ///
    /// Configuration and upstream problems are the server's fault, not the
    /// caller's, so they are not reported as 401.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::ServerMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::KeySetUnavailable => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Organization service error type.
///
/// Maps to HTTP status codes:
/// - Database: 500 Internal Server Error
/// - Auth: 401, 500 or 502 depending on the [`AuthError`]
/// - NotFound: 404 Not Found
/// - BadRequest: 400 Bad Request
#[derive(Debug, Error)]
pub enum OrgError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl OrgError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            OrgError::Database(_) => 500,
            OrgError::Auth(err) => err.status().as_u16(),
            OrgError::NotFound(_) => 404,
            OrgError::BadRequest(_) => 400,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for OrgError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            OrgError::Database(err) => {
                tracing::error!(target: "org.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            OrgError::Auth(err) => {
                if err.status() != StatusCode::UNAUTHORIZED {
                    tracing::error!(target: "org.auth", error = %err, "Token verification could not run");
                }
                (err.status(), err.code(), err.to_string())
            }
            OrgError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            OrgError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone()),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = AUTH_REALM.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<sqlx::Error> for OrgError {
    fn from(err: sqlx::Error) -> Self {
        OrgError::Database(err.to_string())
    }
}
