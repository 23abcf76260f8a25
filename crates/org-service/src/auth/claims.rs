//! Token claims and the authenticated identity derived from them.
//!
//! The subject and email are redacted in Debug output to keep user
//! identifiers out of logs.

use crate::errors::AuthError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// The `aud` claim, which may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether `expected` is one of the token's audiences.
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Typed view of the claims the verifier inspects.
///
/// Unknown claims are ignored here and kept in the raw map carried by
/// [`AuthenticatedUser`].
#[derive(Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,

    /// Legacy subject claim used when `sub` is absent.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default)]
    pub iss: Option<String>,

    pub exp: i64,

    #[serde(default)]
    pub iat: Option<i64>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl TokenClaims {
    /// Build the typed view from a verified claims map.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedToken` when a known claim has the wrong
    /// JSON type (e.g. a numeric `sub`).
    pub fn from_map(raw: &Map<String, Value>) -> Result<Self, AuthError> {
        serde_json::from_value(Value::Object(raw.clone())).map_err(|e| {
            tracing::debug!(target: "org.auth.jwt", error = %e, "Token claims have unexpected types");
            AuthError::MalformedToken
        })
    }

    /// The caller's subject: `sub`, falling back to `user_id`.
    ///
    /// Empty strings count as absent.
    pub fn subject(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.user_id.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Identity of a successfully verified caller.
///
/// Created per request by the auth middleware and discarded with it.
#[derive(Clone)]
pub struct AuthenticatedUser {
    /// Subject identifier from the token.
    pub user_id: String,

    /// Email claim, when the issuer includes one.
    pub email: Option<String>,

    /// All claims of the verified token.
    pub claims: Map<String, Value>,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user_id", &"[REDACTED]")
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("claim_count", &self.claims.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_audience_single_and_list() {
        let single: Audience = serde_json::from_value(json!("authenticated")).unwrap();
        assert!(single.contains("authenticated"));
        assert!(!single.contains("other"));

        let many: Audience = serde_json::from_value(json!(["a", "authenticated"])).unwrap();
        assert!(many.contains("authenticated"));
        assert!(!many.contains("b"));
    }

    #[test]
    fn test_from_map_full_claims() {
        let raw = claims_map(json!({
            "sub": "user-123",
            "email": "alice@example.com",
            "aud": "authenticated",
            "iss": "https://example.supabase.co/auth/v1",
            "exp": 2_000_000_000_i64,
            "iat": 1_700_000_000_i64,
            "role": "authenticated"
        }));

        let claims = TokenClaims::from_map(&raw).unwrap();
        assert_eq!(claims.subject(), Some("user-123"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.aud, Some(Audience::Single("authenticated".to_string())));
        assert_eq!(claims.iat, Some(1_700_000_000));
    }

    #[test]
    fn test_subject_falls_back_to_user_id() {
        let raw = claims_map(json!({"user_id": "legacy-user", "exp": 1}));
        let claims = TokenClaims::from_map(&raw).unwrap();
        assert_eq!(claims.subject(), Some("legacy-user"));
    }

    #[test]
    fn test_empty_sub_falls_back_to_user_id() {
        let raw = claims_map(json!({"sub": "", "user_id": "legacy-user", "exp": 1}));
        let claims = TokenClaims::from_map(&raw).unwrap();
        assert_eq!(claims.subject(), Some("legacy-user"));
    }

    #[test]
    fn test_subject_absent() {
        let raw = claims_map(json!({"exp": 1}));
        let claims = TokenClaims::from_map(&raw).unwrap();
        assert!(claims.subject().is_none());
    }

    #[test]
    fn test_from_map_rejects_wrong_types() {
        let raw = claims_map(json!({"sub": 42, "exp": 1}));
        assert_eq!(
            TokenClaims::from_map(&raw).unwrap_err(),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn test_debug_redacts_identifiers() {
        let raw = claims_map(json!({"sub": "secret-user-id", "email": "secret@example.com", "exp": 1}));
        let claims = TokenClaims::from_map(&raw).unwrap();
        let debug_str = format!("{claims:?}");
        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("secret@example.com"));

        let user = AuthenticatedUser {
            user_id: "secret-user-id".to_string(),
            email: Some("secret@example.com".to_string()),
            claims: raw,
        };
        let debug_str = format!("{user:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("secret@example.com"));
    }
}
