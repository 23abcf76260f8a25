//! Secret types for values that must never reach logs.
//!
//! The organization service holds two long-lived secrets: the identity
//! provider's public API key (sent when fetching the key set) and the
//! optional HS256 shared secret. Both are stored as [`SecretString`], whose
//! `Debug` output is redacted, so any struct deriving `Debug` around them is
//! safe to log.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct KeySetCredentials {
//!     url: String,
//!     api_key: SecretString,
//! }
//!
//! let creds = KeySetCredentials {
//!     url: "https://idp.example.com/jwks.json".to_string(),
//!     api_key: SecretString::from("anon-key"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("anon-key"));
//! assert_eq!(creds.api_key.expose_secret(), "anon-key");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

/// Wrap an optional raw value as a secret, treating blank values as unset.
///
/// Environment files commonly carry `KEY=` lines for secrets that are not
/// configured in a given deployment; those must behave like a missing
/// variable rather than an empty secret.
#[must_use]
pub fn non_empty_secret(value: Option<String>) -> Option<SecretString> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}
