//! Buffered response writing.
//!
//! # Data Flow
//! ```text
//! handler / transaction
//!     → writer.rs (status, headers, body buffered in memory)
//!     → merge into the request's canonical writer
//!     → before-flush callbacks drained by the request context
//!     → writer.rs commit (single write to the real sink)
//!     → sink.rs (ResponseSink implemented by the HTTP layer)
//! ```
//!
//! # Design Decisions
//! - Nothing reaches the real sink before `commit`, and `commit` runs once
//! - Optional sink capabilities (flush, hijack) are discovered at runtime
//! - Writers are recycled through `pool.rs`; every field is reset on acquire and release

pub mod error;
pub mod pool;
pub mod sink;
pub mod writer;

pub use error::ResponseError;
pub use pool::WriterPool;
pub use sink::{Flusher, HijackedConnection, Hijacker, ResponseSink, SharedSink};
pub use writer::{BeforeFlush, BufferedResponseWriter, HeaderMerge, RETAINED_BODY_CAPACITY};
