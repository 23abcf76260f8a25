//! Bearer token verification.
//!
//! Tokens are issued by an external identity provider. Two signing schemes
//! are accepted:
//! - Rotating asymmetric keys (ES256, RS256) resolved by `kid` from the
//!   provider's key set
//! - A static shared secret (HS256), only when one is configured
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The algorithm is taken from the header only to pick a path; the key
//!   used must be valid for that algorithm, so `alg` cannot be downgraded
//! - `none` and every other algorithm are rejected
//! - Audience and issuer are checked only when configured

use crate::auth::claims::{AuthenticatedUser, TokenClaims};
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::{parse_header, validate_iat, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Scheme prefix of the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// How a token's signature is checked, chosen from its declared algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerificationPath {
    /// Public key looked up by `kid` in the remote key set.
    RotatingKey(Algorithm),
    /// Configured shared secret.
    SharedSecret,
}

impl VerificationPath {
    fn for_algorithm(alg: &str) -> Result<Self, AuthError> {
        match alg {
            "ES256" => Ok(VerificationPath::RotatingKey(Algorithm::ES256)),
            "RS256" => Ok(VerificationPath::RotatingKey(Algorithm::RS256)),
            "HS256" => Ok(VerificationPath::SharedSecret),
            other => {
                tracing::debug!(target: "org.auth.jwt", alg = %other, "Unsupported token algorithm");
                Err(AuthError::UnsupportedAlgorithm)
            }
        }
    }
}

/// Extract the token from a raw `Authorization` header value.
///
/// # Errors
///
/// Returns `AuthError::MissingOrMalformedCredential` if the header is
/// absent, does not use the `Bearer` scheme, or carries an empty token.
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingOrMalformedCredential)
}

/// Verifies bearer tokens and extracts the caller's identity.
pub struct TokenVerifier {
    jwks_client: Arc<JwksClient>,
    shared_secret: Option<SecretString>,
    expected_audience: Option<String>,
    expected_issuer: Option<String>,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Create a verifier that accepts only key-set signed tokens.
    ///
    /// Use the `with_*` builders to enable the shared-secret path and the
    /// optional audience and issuer checks.
    pub fn new(jwks_client: Arc<JwksClient>, clock_skew: Duration) -> Self {
        Self {
            jwks_client,
            shared_secret: None,
            expected_audience: None,
            expected_issuer: None,
            clock_skew,
        }
    }

    /// Enable HS256 verification with `secret`.
    #[must_use]
    pub fn with_shared_secret(mut self, secret: Option<SecretString>) -> Self {
        self.shared_secret = secret;
        self
    }

    /// Require `aud` to contain `audience`.
    #[must_use]
    pub fn with_expected_audience(mut self, audience: Option<String>) -> Self {
        self.expected_audience = audience;
        self
    }

    /// Require `iss` to equal `issuer`.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: Option<String>) -> Self {
        self.expected_issuer = issuer;
        self
    }

    /// Authenticate a request from its raw `Authorization` header value.
    ///
    /// Records the outcome in the token validation metrics.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing the first check that failed.
    #[instrument(skip_all, name = "org.auth.authenticate")]
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let result = match extract_bearer_token(authorization) {
            Ok(token) => self.verify(token).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => metrics::record_token_validation("success", "none"),
            Err(e) => metrics::record_token_validation("error", e.code()),
        }

        result
    }

    /// Verify a bare token (without the `Bearer ` prefix).
    ///
    /// # Checks
    ///
    /// 1. Size limit and header decoding
    /// 2. Algorithm dispatch and key resolution
    /// 3. Signature and expiry
    /// 4. `iat` within the clock skew
    /// 5. Audience and issuer, when configured
    /// 6. Subject present
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] describing the first check that failed.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = parse_header(token).map_err(|e| {
            tracing::debug!(target: "org.auth.jwt", error = ?e, "Token header rejected");
            AuthError::MalformedToken
        })?;

        let raw_claims = match VerificationPath::for_algorithm(&header.alg)? {
            VerificationPath::RotatingKey(alg) => {
                let kid = header.kid.ok_or_else(|| {
                    tracing::debug!(target: "org.auth.jwt", "Asymmetric token missing kid");
                    AuthError::MalformedToken
                })?;
                let jwk = self.jwks_client.get_key(&kid).await?;
                let key = decoding_key_for(&jwk, alg)?;
                decode_claims(token, &key, alg)?
            }
            VerificationPath::SharedSecret => {
                let secret = self.shared_secret.as_ref().ok_or_else(|| {
                    tracing::error!(
                        target: "org.auth.jwt",
                        "HS256 token received but no shared secret is configured"
                    );
                    AuthError::ServerMisconfigured
                })?;
                let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
                decode_claims(token, &key, Algorithm::HS256)?
            }
        };

        let claims = TokenClaims::from_map(&raw_claims)?;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| match e {
                JwtValidationError::IatTooFarInFuture => AuthError::IssuedInFuture,
                _ => AuthError::MalformedToken,
            })?;
        }

        self.check_optional_claims(&claims)?;

        let user_id = claims
            .subject()
            .ok_or(AuthError::MissingSubject)?
            .to_string();

        tracing::debug!(target: "org.auth.jwt", alg = %header.alg, "Token validated successfully");

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email.clone(),
            claims: raw_claims,
        })
    }

    fn check_optional_claims(&self, claims: &TokenClaims) -> Result<(), AuthError> {
        if let Some(expected) = &self.expected_audience {
            let matches = claims.aud.as_ref().is_some_and(|aud| aud.contains(expected));
            if !matches {
                tracing::debug!(target: "org.auth.jwt", aud = ?claims.aud, "Token audience mismatch");
                return Err(AuthError::InvalidAudience);
            }
        }

        if let Some(expected) = &self.expected_issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                tracing::debug!(target: "org.auth.jwt", iss = ?claims.iss, "Token issuer mismatch");
                return Err(AuthError::InvalidIssuer);
            }
        }

        Ok(())
    }
}

/// Build a decoding key from `jwk`, requiring it to fit `alg`.
///
/// A key of the wrong family or curve cannot have produced a valid
/// signature, so a mismatch is reported as `InvalidSignature`.
fn decoding_key_for(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, AuthError> {
    let mismatch = |reason: &'static str| {
        tracing::warn!(target: "org.auth.jwt", kid = ?jwk.kid, reason, "Key-set entry unusable for token");
        AuthError::InvalidSignature
    };

    if let Some(key_alg) = &jwk.alg {
        let expected = match alg {
            Algorithm::ES256 => "ES256",
            Algorithm::RS256 => "RS256",
            _ => return Err(mismatch("unsupported algorithm")),
        };
        if key_alg != expected {
            return Err(mismatch("key algorithm differs from token algorithm"));
        }
    }

    match alg {
        Algorithm::ES256 => {
            if jwk.kty != "EC" {
                return Err(mismatch("expected EC key"));
            }
            if jwk.crv.as_deref().is_some_and(|crv| crv != "P-256") {
                return Err(mismatch("expected P-256 curve"));
            }
            let (Some(x), Some(y)) = (&jwk.x, &jwk.y) else {
                return Err(mismatch("EC key missing coordinates"));
            };
            DecodingKey::from_ec_components(x, y).map_err(|_| mismatch("invalid EC coordinates"))
        }
        Algorithm::RS256 => {
            if jwk.kty != "RSA" {
                return Err(mismatch("expected RSA key"));
            }
            let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
                return Err(mismatch("RSA key missing modulus or exponent"));
            };
            DecodingKey::from_rsa_components(n, e).map_err(|_| mismatch("invalid RSA components"))
        }
        _ => Err(mismatch("unsupported algorithm")),
    }
}

/// Verify signature, `exp` and `nbf`, returning the raw claims.
fn decode_claims(
    token: &str,
    key: &DecodingKey,
    alg: Algorithm,
) -> Result<Map<String, Value>, AuthError> {
    let mut validation = Validation::new(alg);
    validation.leeway = 0;
    validation.validate_nbf = true;
    // Audience is checked separately, and only when configured
    validation.validate_aud = false;

    decode::<Map<String, Value>>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "org.auth.jwt", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::ImmatureSignature => AuthError::IssuedInFuture,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })
}
