//! Key-set client for fetching and caching the identity provider's public keys.
//!
//! The provider publishes its rotating signing keys as a JSON Web Key Set.
//! Keys are cached process-wide for a configurable TTL. A token whose `kid`
//! is missing from a fresh cache forces exactly one refetch, which picks up
//! keys rotated in since the last fetch.
//!
//! # Security
//!
//! - The API key is sent as both an `apikey` header and a bearer credential
//!   and is never logged
//! - A failed fetch never clears or replaces the current cache
//! - HTTPS should be used in production (enforced by deployment config)

use crate::errors::AuthError;
use crate::observability::metrics;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Timeout for a single key-set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the key-set endpoint.
///
/// Only the members needed for EC (P-256) and RSA verification keys are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("EC", "RSA", "oct", ...).
    #[serde(default)]
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Curve name for EC keys (e.g. "P-256").
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is meant for (e.g. "ES256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// Key-set document as served by the provider.
///
/// A missing or non-list `keys` member rejects the document. Individual
/// entries that do not parse as a [`Jwk`] are dropped so one bad sibling
/// cannot hide the valid keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawKeySet")]
pub struct KeySet {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

impl From<RawKeySet> for KeySet {
    fn from(raw: RawKeySet) -> Self {
        let keys = raw
            .keys
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    tracing::warn!(target: "org.auth.jwks", error = %e, "Skipping malformed key-set entry");
                    None
                }
            })
            .collect();

        Self { keys }
    }
}

/// Where key sets come from.
///
/// Production uses [`HttpKeySetSource`]; tests substitute counting mocks.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` on any network, status or
    /// payload failure.
    async fn fetch(&self) -> Result<KeySet, AuthError>;
}

/// Fetches the key set over HTTP.
pub struct HttpKeySetSource {
    url: String,
    api_key: Option<SecretString>,
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `url`, optionally authenticating with `api_key`.
    pub fn new(url: String, api_key: Option<SecretString>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "org.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            url,
            api_key,
            http_client,
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<KeySet, AuthError> {
        tracing::debug!(target: "org.auth.jwks", url = %self.url, "Fetching key set");

        let mut request = self.http_client.get(&self.url);
        if let Some(api_key) = &self.api_key {
            request = request
                .header("apikey", api_key.expose_secret())
                .bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(target: "org.auth.jwks", error = %e, "Failed to fetch key set");
            AuthError::KeySetUnavailable
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "org.auth.jwks",
                status = %response.status(),
                "Key-set endpoint returned error"
            );
            return Err(AuthError::KeySetUnavailable);
        }

        response.json::<KeySet>().await.map_err(|e| {
            tracing::error!(target: "org.auth.jwks", error = %e, "Malformed key set from provider");
            AuthError::KeySetUnavailable
        })
    }
}

/// A fetched key set indexed by key ID.
struct CachedKeySet {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn from_key_set(key_set: KeySet) -> Self {
        // Keys without a kid can never be selected by a token header
        let keys = key_set
            .keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();

        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Key-set client with a TTL cache and refresh-on-miss.
///
/// Readers clone an `Arc` snapshot of the cache; a refresh swaps in a new
/// snapshot under the write lock. Concurrent refreshes may both fetch, and
/// the last one to finish wins.
pub struct JwksClient {
    source: Arc<dyn KeySetSource>,
    cache: RwLock<Option<Arc<CachedKeySet>>>,
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a client that fetches over HTTP.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the provider's key-set endpoint
    /// * `api_key` - Optional API key sent with each fetch
    /// * `cache_ttl` - How long a fetched key set stays fresh
    pub fn new(jwks_url: String, api_key: Option<SecretString>, cache_ttl: Duration) -> Self {
        Self::with_source(Arc::new(HttpKeySetSource::new(jwks_url, api_key)), cache_ttl)
    }

    /// Create a client backed by any [`KeySetSource`].
    pub fn with_source(source: Arc<dyn KeySetSource>, cache_ttl: Duration) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
            cache_ttl,
        }
    }

    /// Get a JWK by key ID.
    ///
    /// Serves from the cache when it is fresh. A stale or empty cache is
    /// refreshed first. If the key is still missing, one more unconditional
    /// refresh is made before giving up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if a needed fetch fails.
    /// Returns `AuthError::UnknownSigningKey` if the key ID is not found
    /// after the forced refresh.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        // Release the read guard before a refresh takes the write lock
        let current = self.cache.read().await.clone();
        let snapshot = match current {
            Some(cached) if cached.is_fresh(self.cache_ttl) => cached,
            _ => self.refresh_snapshot().await?,
        };

        if let Some(key) = snapshot.keys.get(kid) {
            tracing::debug!(target: "org.auth.jwks", kid = %kid, "Key-set cache hit");
            return Ok(key.clone());
        }

        tracing::debug!(target: "org.auth.jwks", kid = %kid, "Key not in cache, forcing refresh");
        let refreshed = self.refresh_snapshot().await?;

        refreshed.keys.get(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "org.auth.jwks", kid = %kid, "Key not found after forced refresh");
            AuthError::UnknownSigningKey
        })
    }

    #[instrument(skip(self), name = "org.auth.jwks.refresh")]
    async fn refresh_snapshot(&self) -> Result<Arc<CachedKeySet>, AuthError> {
        let start = std::time::Instant::now();
        let result = self.source.fetch().await;
        let duration = start.elapsed();

        let key_set = match result {
            Ok(key_set) => {
                metrics::record_jwks_refresh("success", duration);
                key_set
            }
            Err(e) => {
                metrics::record_jwks_refresh("error", duration);
                return Err(e);
            }
        };

        let cached = Arc::new(CachedKeySet::from_key_set(key_set));
        tracing::info!(
            target: "org.auth.jwks",
            key_count = cached.keys.len(),
            "Key-set cache refreshed"
        );

        *self.cache.write().await = Some(Arc::clone(&cached));
        Ok(cached)
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Counting key-set source whose payload can be swapped between calls.
    ///
    /// `None` makes the next fetches fail.
    struct MockKeySetSource {
        key_set: Mutex<Option<KeySet>>,
        call_count: AtomicUsize,
    }

    impl MockKeySetSource {
        fn serving(kids: &[&str]) -> Self {
            Self {
                key_set: Mutex::new(Some(key_set(kids))),
                call_count: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                key_set: Mutex::new(None),
                call_count: AtomicUsize::new(0),
            }
        }

        fn set(&self, key_set: Option<KeySet>) {
            *self.key_set.lock().unwrap() = key_set;
        }

        fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySetSource for MockKeySetSource {
        async fn fetch(&self) -> Result<KeySet, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.key_set
                .lock()
                .unwrap()
                .clone()
                .ok_or(AuthError::KeySetUnavailable)
        }
    }

    fn ec_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            kid: Some(kid.to_string()),
            crv: Some("P-256".to_string()),
            x: Some("x".to_string()),
            y: Some("y".to_string()),
            n: None,
            e: None,
            alg: Some("ES256".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    fn key_set(kids: &[&str]) -> KeySet {
        KeySet {
            keys: kids.iter().map(|kid| ec_jwk(kid)).collect(),
        }
    }

    impl JwksClient {
        async fn cached_key_count(&self) -> Option<usize> {
            self.cache.read().await.as_ref().map(|c| c.keys.len())
        }
    }

    fn client(source: &Arc<MockKeySetSource>, ttl: Duration) -> JwksClient {
        JwksClient::with_source(Arc::clone(source) as Arc<dyn KeySetSource>, ttl)
    }

    #[test]
    fn test_jwk_deserialization_ec() {
        let json = r#"{
            "kty": "EC",
            "kid": "key-2024-01",
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
            "alg": "ES256",
            "use": "sig"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.kid.as_deref(), Some("key-2024-01"));
        assert_eq!(jwk.crv.as_deref(), Some("P-256"));
        assert!(jwk.x.is_some());
        assert!(jwk.y.is_some());
        assert_eq!(jwk.alg.as_deref(), Some("ES256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kid": "bare"}"#).unwrap();

        assert_eq!(jwk.kty, "");
        assert_eq!(jwk.kid.as_deref(), Some("bare"));
        assert!(jwk.crv.is_none());
        assert!(jwk.n.is_none());
    }

    #[test]
    fn test_key_set_requires_keys_list() {
        assert!(serde_json::from_str::<KeySet>(r#"{"not_keys": []}"#).is_err());
        assert!(serde_json::from_str::<KeySet>(r#"{"keys": "nope"}"#).is_err());
        assert!(serde_json::from_str::<KeySet>(r#"{"keys": []}"#).is_ok());
    }

    #[test]
    fn test_key_set_skips_malformed_entries() {
        let json = r#"{
            "keys": [
                {"kty": "EC", "kid": "good", "crv": "P-256", "x": "AAAA", "y": "AAAA"},
                {"kty": "oct", "kid": 7},
                "not-an-object"
            ]
        }"#;

        let set: KeySet = serde_json::from_str(json).unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys.first().unwrap().kid.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_malformed_sibling_does_not_hide_valid_key() {
        let set: KeySet = serde_json::from_value(serde_json::json!({
            "keys": [
                {"kty": "EC", "kid": "good", "crv": "P-256", "x": "AAAA", "y": "AAAA"},
                {"kty": "oct", "kid": 7}
            ]
        }))
        .unwrap();
        let source = Arc::new(MockKeySetSource {
            key_set: Mutex::new(Some(set)),
            call_count: AtomicUsize::new(0),
        });
        let client = client(&source, Duration::from_secs(3600));

        let key = client.get_key("good").await.unwrap();
        assert_eq!(key.kid.as_deref(), Some("good"));
    }

    #[test]
    fn test_cached_key_set_skips_keys_without_kid() {
        let mut set = key_set(&["a"]);
        let mut anonymous = ec_jwk("ignored");
        anonymous.kid = None;
        set.keys.push(anonymous);

        let cached = CachedKeySet::from_key_set(set);
        assert_eq!(cached.keys.len(), 1);
        assert!(cached.keys.contains_key("a"));
    }

    #[tokio::test]
    async fn test_get_key_fetches_once_within_ttl() {
        let source = Arc::new(MockKeySetSource::serving(&["k1"]));
        let client = client(&source, Duration::from_secs(3600));

        client.get_key("k1").await.unwrap();
        client.get_key("k1").await.unwrap();

        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_forces_exactly_one_refresh() {
        let source = Arc::new(MockKeySetSource::serving(&["k1"]));
        let client = client(&source, Duration::from_secs(3600));

        client.get_key("k1").await.unwrap();
        assert_eq!(source.call_count(), 1);

        let err = client.get_key("missing").await.unwrap_err();
        assert_eq!(err, AuthError::UnknownSigningKey);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rotated_key_found_by_forced_refresh() {
        let source = Arc::new(MockKeySetSource::serving(&["old"]));
        let client = client(&source, Duration::from_secs(3600));

        client.get_key("old").await.unwrap();
        source.set(Some(key_set(&["old", "new"])));

        let key = client.get_key("new").await.unwrap();
        assert_eq!(key.kid.as_deref(), Some("new"));
        assert_eq!(source.call_count(), 2);

        // The rotated key is now served from cache
        client.get_key("new").await.unwrap();
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_cache_is_refetched() {
        let source = Arc::new(MockKeySetSource::serving(&["k1"]));
        let client = client(&source, Duration::ZERO);

        client.get_key("k1").await.unwrap();
        client.get_key("k1").await.unwrap();

        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_untouched() {
        let source = Arc::new(MockKeySetSource::serving(&["k1", "k2"]));
        let client = client(&source, Duration::from_secs(3600));

        client.get_key("k1").await.unwrap();
        source.set(None);

        // Miss triggers a forced refresh, which fails
        let err = client.get_key("k3").await.unwrap_err();
        assert_eq!(err, AuthError::KeySetUnavailable);

        assert_eq!(client.cached_key_count().await, Some(2));
        client.get_key("k2").await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_refresh_warms_cache() {
        let source = Arc::new(MockKeySetSource::serving(&["k1", "k2"]));
        let client = client(&source, Duration::from_secs(3600));
        assert!(client.cached_key_count().await.is_none());

        client.refresh_snapshot().await.unwrap();
        assert_eq!(client.cached_key_count().await, Some(2));

        client.get_key("k2").await.unwrap();
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_initial_fetch_failure() {
        let source = Arc::new(MockKeySetSource::failing());
        let client = client(&source, Duration::from_secs(3600));

        let err = client.get_key("k1").await.unwrap_err();
        assert_eq!(err, AuthError::KeySetUnavailable);
        assert_eq!(source.call_count(), 1);
        assert!(client.cached_key_count().await.is_none());
    }
}
