//! HTTP metrics middleware.
//!
//! Applied as the outermost layer so that every response is counted,
//! including the router's own 404/405 and the auth layer's 401s.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Record method, normalized path, status and duration of each request.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use tower::ServiceExt;

    async fn list() -> &'static str {
        "[]"
    }

    async fn broken() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "Error")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/api/organizations", get(list))
            .route("/api/organizations/:id", get(broken))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn send(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        test_app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_middleware_counts_every_status() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = metrics::set_default_local_recorder(&recorder);

        assert_eq!(send("/api/organizations").await, StatusCode::OK);
        assert_eq!(send("/api/organizations/42").await, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(send("/nonexistent").await, StatusCode::NOT_FOUND);

        let recorded: Vec<(String, u64)> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == "org_http_requests_total")
            .filter_map(|(key, _, _, value)| {
                let code = key
                    .key()
                    .labels()
                    .find(|l| l.key() == "status_code")
                    .map(|l| l.value().to_string())?;
                match value {
                    DebugValue::Counter(n) => Some((code, n)),
                    _ => None,
                }
            })
            .collect();

        assert!(recorded.contains(&("200".to_string(), 1)));
        assert!(recorded.contains(&("500".to_string(), 1)));
        assert!(recorded.contains(&("404".to_string(), 1)));
    }
}
