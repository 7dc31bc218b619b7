//! Shared utilities for integration testing.

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use scoped_response::{AppConfig, HttpServer};
use tower::ServiceExt;

/// A response read back in full.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Server with the default configuration and no routes.
pub fn server() -> HttpServer {
    HttpServer::new(AppConfig::default())
}

/// Send one request through `router` in-process.
pub async fn send(router: Router, method: Method, path: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// `GET path` through `router`.
pub async fn get(router: Router, path: &str) -> TestResponse {
    send(router, Method::GET, path, "").await
}
