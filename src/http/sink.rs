//! The real response sink backed by an axum/hyper response.
//!
//! # Responsibilities
//! - Receive the single committed status, header map and body
//! - Turn that into the `Response<Body>` handed back to axum
//! - Expose connection hijacking through hyper's upgrade mechanism

use std::io;
use std::mem;

use axum::{
    body::Body,
    http::{HeaderMap, Request, Response, StatusCode},
};
use hyper::upgrade::OnUpgrade;

use crate::response::{HijackedConnection, Hijacker, ResponseError, ResponseSink};

/// Sink collecting a response for axum.
#[derive(Debug, Default)]
pub struct HttpSink {
    /// Headers every writer starts from (e.g. the request ID).
    base_headers: HeaderMap,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    on_upgrade: Option<OnUpgrade>,
}

impl HttpSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink for `request`, taking its pending upgrade (if any) so the
    /// connection can be hijacked later.
    pub fn from_request<B>(request: &mut Request<B>) -> Self {
        Self {
            on_upgrade: request.extensions_mut().remove::<OnUpgrade>(),
            ..Self::default()
        }
    }

    pub fn base_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.base_headers
    }

    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// Build the final response from what was committed, leaving the sink empty.
    ///
    /// A sink that never received a commit produces an empty `200 OK`.
    pub fn take_response(&mut self) -> Response<Body> {
        let mut response = Response::new(Body::from(mem::take(&mut self.body)));
        *response.status_mut() = self.status.take().unwrap_or(StatusCode::OK);
        *response.headers_mut() = mem::take(&mut self.headers);
        response
    }
}

impl ResponseSink for HttpSink {
    fn headers(&self) -> &HeaderMap {
        &self.base_headers
    }

    fn write_header(&mut self, status: StatusCode, headers: &HeaderMap) {
        if self.status.is_some() {
            tracing::warn!(status = %status, "Response head already written, ignoring");
            return;
        }
        self.status = Some(status);
        self.headers = headers.clone();
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(body);
        Ok(())
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        if self.on_upgrade.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl Hijacker for HttpSink {
    fn hijack(&mut self) -> Result<HijackedConnection, ResponseError> {
        self.on_upgrade
            .take()
            .map(HijackedConnection::new)
            .ok_or(ResponseError::HijackUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_take_response() {
        let mut sink = HttpSink::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("1"));

        sink.write_header(StatusCode::CREATED, &headers);
        sink.write_body(b"created").unwrap();
        assert!(sink.is_written());

        let response = sink.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-test").unwrap(), "1");
    }

    #[test]
    fn test_second_head_ignored() {
        let mut sink = HttpSink::new();
        sink.write_header(StatusCode::OK, &HeaderMap::new());
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new());
        assert_eq!(sink.take_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_hijack_requires_upgrade() {
        let mut plain = HttpSink::new();
        assert!(plain.as_hijacker().is_none());
        assert!(matches!(
            Hijacker::hijack(&mut plain),
            Err(ResponseError::HijackUnsupported)
        ));

        let mut request = Request::new(());
        let upgrade = hyper::upgrade::on(&mut request);
        let mut request = Request::new(());
        request.extensions_mut().insert(upgrade);

        let mut sink = HttpSink::from_request(&mut request);
        let hijacker = sink.as_hijacker().expect("upgrade present");
        assert!(hijacker.hijack().is_ok());
        assert!(sink.as_hijacker().is_none());
    }
}
