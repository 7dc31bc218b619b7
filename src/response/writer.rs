//! Buffered response writer.
//!
//! # Responsibilities
//! - Accumulate status code, headers and body in memory
//! - Support rollback (`reset`), cloning and merging into another writer
//! - Hold the ordered queue of before-flush callbacks
//! - Perform the single real write to the sink (`commit`)
//!
//! # Design Decisions
//! - `clone` is a deep copy: a clone never aliases the original's headers
//! - `write` reports the bytes written by the call, not the buffer length
//! - Higher status codes win on merge, so a sub-scope error is never downgraded

use std::collections::VecDeque;
use std::fmt;
use std::io;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::observability::metrics;
use crate::response::error::{ResponseError, ResponseResult};
use crate::response::sink::{lock_sink, HijackedConnection, SharedSink};

/// Body capacity a detached writer may keep for reuse.
pub const RETAINED_BODY_CAPACITY: usize = 64 * 1024;

/// Deferred action run by the owning context immediately before commit.
pub type BeforeFlush = Box<dyn FnOnce(&mut RequestContext) + Send>;

/// How headers are combined when one writer is merged into another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMerge {
    /// Copy a header (all of its values) only if the target has no value under that name.
    #[default]
    Name,
    /// Copy each `(name, value)` pair unless the target already holds that exact pair.
    Value,
}

/// A response writer that defers all I/O until commit.
#[derive(Default)]
pub struct BufferedResponseWriter {
    sink: Option<SharedSink>,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    before_flush: VecDeque<BeforeFlush>,
    committed: bool,
}

impl BufferedResponseWriter {
    /// Create a writer on top of `sink`, starting from the sink's headers.
    pub fn new(sink: SharedSink) -> Self {
        let mut writer = Self::default();
        writer.attach(sink);
        writer
    }

    /// Bind this writer to a sink. Every field is reset first.
    pub fn attach(&mut self, sink: SharedSink) {
        self.detach();
        self.headers = lock_sink(&sink).headers().clone();
        self.sink = Some(sink);
    }

    /// Drop the sink reference and clear every field. Returns the sink, if any.
    ///
    /// Body capacity above [`RETAINED_BODY_CAPACITY`] is released.
    pub fn detach(&mut self) -> Option<SharedSink> {
        let sink = self.sink.take();
        self.status = None;
        self.headers.clear();
        self.body.clear();
        self.body.shrink_to(RETAINED_BODY_CAPACITY);
        self.before_flush.clear();
        self.committed = false;
        sink
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The buffered status code; `None` until `write_header` is called.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    /// Record the status code. Nothing is sent yet; the last call before commit wins.
    pub fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                self.headers.insert(header::CONTENT_TYPE, value);
            }
            Err(_) => {
                tracing::warn!(content_type = %content_type, "Ignoring invalid content type");
            }
        }
    }

    /// Append to the buffered body. Returns the number of bytes appended.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Append `value` as JSON and set the JSON content type.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<usize, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.set_content_type("application/json");
        Ok(self.write(&bytes))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replace the buffered body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn set_body_string(&mut self, body: impl Into<String>) {
        self.body = body.into().into_bytes();
    }

    /// Truncate the body, keeping its allocation.
    pub fn reset_body(&mut self) {
        self.body.clear();
    }

    /// Drop tentative headers and start again from the sink's headers.
    pub fn reset_headers(&mut self) {
        self.headers = match &self.sink {
            Some(sink) => lock_sink(sink).headers().clone(),
            None => HeaderMap::new(),
        };
    }

    /// Full rollback of the tentative status, headers and body.
    ///
    /// Before-flush callbacks are kept.
    pub fn reset(&mut self) {
        self.reset_headers();
        self.status = None;
        self.reset_body();
    }

    /// Register a callback to run just before the response is committed.
    pub fn set_before_flush<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut RequestContext) + Send + 'static,
    {
        self.before_flush.push_back(Box::new(callback));
    }

    /// Pop the oldest pending before-flush callback.
    pub fn take_before_flush(&mut self) -> Option<BeforeFlush> {
        self.before_flush.pop_front()
    }

    pub fn pending_before_flush(&self) -> usize {
        self.before_flush.len()
    }

    /// Merge status, headers, body and callbacks into `other` using name-level header dedup.
    pub fn merge_into(&mut self, other: &mut BufferedResponseWriter) {
        self.merge_into_with(other, HeaderMerge::Name);
    }

    /// Merge into `other`.
    ///
    /// - status: copied when strictly greater than `other`'s (unset counts as 0)
    /// - headers: according to `mode`
    /// - body: appended when non-empty
    /// - before-flush callbacks: moved to the back of `other`'s queue
    pub fn merge_into_with(&mut self, other: &mut BufferedResponseWriter, mode: HeaderMerge) {
        let ours = self.status.map_or(0, |s| s.as_u16());
        let theirs = other.status.map_or(0, |s| s.as_u16());
        if ours > theirs {
            other.status = self.status;
        }

        match mode {
            HeaderMerge::Name => {
                for name in self.headers.keys() {
                    if other.headers.contains_key(name) {
                        continue;
                    }
                    for value in self.headers.get_all(name) {
                        other.headers.append(name.clone(), value.clone());
                    }
                }
            }
            HeaderMerge::Value => {
                for (name, value) in self.headers.iter() {
                    let present = other.headers.get_all(name).iter().any(|v| v == value);
                    if !present {
                        other.headers.append(name.clone(), value.clone());
                    }
                }
            }
        }

        if !self.body.is_empty() {
            other.write(&self.body);
        }

        self.merge_callbacks_into(other);
    }

    /// Move only the before-flush callbacks into `other`, preserving order.
    pub fn merge_callbacks_into(&mut self, other: &mut BufferedResponseWriter) {
        other.before_flush.append(&mut self.before_flush);
    }

    /// Push already-written data to the client if the sink supports it.
    ///
    /// Returns `Ok(false)` when the sink has no flush capability.
    pub fn flush(&mut self) -> ResponseResult<bool> {
        let sink = self.sink.as_ref().ok_or(ResponseError::Detached)?;
        let mut sink = lock_sink(sink);
        match sink.as_flusher() {
            Some(flusher) => {
                flusher
                    .flush()
                    .map_err(|e| ResponseError::Flush(e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the buffered status, headers and body to the real sink.
    ///
    /// Before-flush callbacks are the owning context's job and must already have run.
    pub fn commit(&mut self) -> ResponseResult<()> {
        if self.committed {
            return Err(ResponseError::AlreadyCommitted);
        }
        let sink = self.sink.as_ref().ok_or(ResponseError::Detached)?;
        let status = *self.status.get_or_insert(StatusCode::OK);

        self.committed = true;
        let mut sink = lock_sink(sink);
        sink.write_header(status, &self.headers);
        if !self.body.is_empty() {
            sink.write_body(&self.body)?;
        }

        metrics::record_flush(status);
        tracing::trace!(status = %status, body_len = self.body.len(), "Response committed");
        Ok(())
    }

    /// Take over the underlying connection.
    ///
    /// After a successful hijack the caller owns the connection and this writer
    /// must not be used for it again.
    pub fn hijack(&mut self) -> ResponseResult<HijackedConnection> {
        let sink = self.sink.as_ref().ok_or(ResponseError::Detached)?;
        let mut sink = lock_sink(sink);
        match sink.as_hijacker() {
            Some(hijacker) => hijacker.hijack(),
            None => Err(ResponseError::HijackUnsupported),
        }
    }
}

impl BufferedResponseWriter {
    /// Like `clone`, but with an empty body. The buffered body is not copied.
    pub fn clone_without_body(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: Vec::new(),
            before_flush: VecDeque::new(),
            committed: false,
        }
    }
}

impl Clone for BufferedResponseWriter {
    /// Same sink, deep copies of status, headers and body, no callbacks.
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            before_flush: VecDeque::new(),
            committed: false,
        }
    }
}

impl io::Write for BufferedResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(BufferedResponseWriter::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        BufferedResponseWriter::flush(self)
            .map(|_| ())
            .map_err(io::Error::other)
    }
}

impl fmt::Debug for BufferedResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedResponseWriter")
            .field("attached", &self.sink.is_some())
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("before_flush", &self.before_flush.len())
            .field("committed", &self.committed)
            .finish()
    }
}
