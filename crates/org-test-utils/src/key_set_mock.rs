//! Mocked key-set endpoint
//!
//! Serves a JWKS document from a `wiremock` server so tests can count how
//! often the service fetches it.

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked key set is served on.
pub const KEY_SET_PATH: &str = "/auth/v1/.well-known/jwks.json";

/// Full key-set URL for `server`.
pub fn key_set_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), KEY_SET_PATH)
}

/// Serve `keys` as the key set.
///
/// With `expected_fetches`, the mock server verifies on drop that the key
/// set was fetched exactly that many times.
pub async fn mount_key_set(server: &MockServer, keys: &[Value], expected_fetches: Option<u64>) {
    let body = serde_json::json!({ "keys": keys });
    let mock = Mock::given(method("GET"))
        .and(path(KEY_SET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body));

    match expected_fetches {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

/// Answer key-set fetches with `status` and no key set.
pub async fn mount_failing_key_set(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(KEY_SET_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
