//! Organization service configuration.
//!
//! Configuration is loaded from environment variables. Secrets and the
//! database URL are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{non_empty_secret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::auth::jwks::DEFAULT_CACHE_TTL_SECONDS;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Organization service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// URL of the identity provider's key-set endpoint.
    pub jwks_url: String,

    /// API key sent with key-set fetches.
    pub api_key: Option<SecretString>,

    /// Shared secret for legacy HS256 tokens. HS256 is rejected when unset.
    pub jwt_secret: Option<SecretString>,

    /// Required `aud` value, set only when audience verification is enabled.
    pub expected_audience: Option<String>,

    /// Required `iss` value, set only when issuer verification is enabled.
    pub expected_issuer: Option<String>,

    /// How long a fetched key set stays fresh.
    pub jwks_cache_ttl: Duration,

    /// Clock skew tolerance for `iat` validation.
    pub jwt_clock_skew: Duration,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwks_url", &self.jwks_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("expected_audience", &self.expected_audience)
            .field("expected_issuer", &self.expected_issuer)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid key-set cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidFlag { name: String, value: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = non_empty(vars, "DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let bind_address =
            non_empty(vars, "BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwks_url = match non_empty(vars, "SUPABASE_JWKS_URL") {
            Some(url) => url,
            None => non_empty(vars, "SUPABASE_PROJECT_ID")
                .map(|project| {
                    format!("https://{project}.supabase.co/auth/v1/.well-known/jwks.json")
                })
                .ok_or_else(|| ConfigError::MissingEnvVar("SUPABASE_JWKS_URL".to_string()))?,
        };

        let api_key = non_empty_secret(vars.get("SUPABASE_ANON_KEY").cloned());
        let jwt_secret = non_empty_secret(vars.get("SUPABASE_JWT_SECRET").cloned());

        let expected_audience =
            expected_claim(vars, "SUPABASE_VERIFY_AUD", "SUPABASE_EXPECTED_AUD")?;
        let expected_issuer = expected_claim(vars, "SUPABASE_VERIFY_ISS", "SUPABASE_EXPECTED_ISS")?;

        let jwks_cache_ttl = match vars.get("JWKS_CACHE_TTL_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.trim().parse().map_err(|e| {
                    ConfigError::InvalidCacheTtl(format!(
                        "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidCacheTtl(
                        "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                Duration::from_secs(value)
            }
            None => Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
        };

        let jwt_clock_skew = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            Some(value_str) => {
                let value: i64 = value_str.trim().parse().map_err(|e| {
                    ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value <= 0 {
                    return Err(ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                        value
                    )));
                }

                let value = value.unsigned_abs();
                if value > MAX_CLOCK_SKEW.as_secs() {
                    return Err(ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                        MAX_CLOCK_SKEW.as_secs(),
                        value
                    )));
                }

                Duration::from_secs(value)
            }
            None => DEFAULT_CLOCK_SKEW,
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            database_url,
            bind_address,
            jwks_url,
            api_key,
            jwt_secret,
            expected_audience,
            expected_issuer,
            jwks_cache_ttl,
            jwt_clock_skew,
            drain_seconds,
        })
    }
}

/// A variable's trimmed value, with blank values treated as unset.
fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(vars: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    let Some(value) = non_empty(vars, name) else {
        return Ok(false);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name: name.to_string(),
            value,
        }),
    }
}

/// The expected claim value when its verify flag is on.
///
/// Enabling a check without saying what to expect is a configuration error.
fn expected_claim(
    vars: &HashMap<String, String>,
    flag: &str,
    expected: &str,
) -> Result<Option<String>, ConfigError> {
    if !parse_flag(vars, flag)? {
        return Ok(None);
    }

    non_empty(vars, expected)
        .map(Some)
        .ok_or_else(|| ConfigError::MissingEnvVar(expected.to_string()))
}
