//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, tracing/timeout layers, exact-path dispatch)
//!     → RequestContext built around an HttpSink (sink.rs)
//!     → transactional handler runs
//!     → RequestContext::finish → HttpSink → axum Response
//!     → Send to client
//! ```

use axum::http::HeaderName;

pub mod server;
pub mod sink;

pub use server::{Handler, HttpServer};
pub use sink::HttpSink;

/// Header carrying the per-request ID on every response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
