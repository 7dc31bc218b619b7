//! Per-request context.
//!
//! # Responsibilities
//! - Own the canonical buffered writer for the whole request
//! - Run transactions in order and merge their outcome
//! - Provide the hooks scopes call back into (skip, emit error, charset)
//! - Drain before-flush callbacks, commit once, recycle the writer

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::{Body, Bytes},
    http::{request::Parts, HeaderValue, Response, StatusCode},
};
use uuid::Uuid;

use crate::config::schema::ResponseConfig;
use crate::context::error_handlers::ErrorHandlers;
use crate::http::sink::HttpSink;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::response::{BufferedResponseWriter, HeaderMerge, ResponseError, SharedSink, WriterPool};
use crate::transaction::{Transaction, TransactionScope};

/// Settings shared by every request context of a server.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Charset used in the default `text/plain` content type of unclassified errors.
    pub charset: String,
    /// Scope given to new transactions.
    pub default_scope: TransactionScope,
    /// Header merge rule used when committing a transaction into the context.
    pub header_merge: HeaderMerge,
    /// Handlers used by `emit_error`.
    pub error_handlers: Arc<ErrorHandlers>,
}

impl ContextSettings {
    pub fn from_config(config: &ResponseConfig, error_handlers: ErrorHandlers) -> Self {
        Self {
            charset: config.charset.clone(),
            default_scope: config.default_scope.into(),
            header_merge: config.header_merge,
            error_handlers: Arc::new(error_handlers),
        }
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self::from_config(&ResponseConfig::default(), ErrorHandlers::default())
    }
}

/// State of one request while its handler runs.
pub struct RequestContext {
    request_id: Uuid,
    request: Parts,
    body: Bytes,
    sink: Arc<Mutex<HttpSink>>,
    writer: BufferedResponseWriter,
    settings: Arc<ContextSettings>,
    pool: Arc<WriterPool>,
    transactions_skipped: bool,
}

impl RequestContext {
    /// Create a context, acquiring its canonical writer from `pool`.
    pub fn new(
        request: Parts,
        body: Bytes,
        mut sink: HttpSink,
        settings: Arc<ContextSettings>,
        pool: Arc<WriterPool>,
    ) -> Self {
        let request_id = Uuid::new_v4();
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            sink.base_headers_mut().insert(X_REQUEST_ID, value);
        }

        let sink = Arc::new(Mutex::new(sink));
        let shared: SharedSink = sink.clone();
        let writer = pool.acquire(shared);

        Self {
            request_id,
            request,
            body,
            sink,
            writer,
            settings,
            pool,
            transactions_skipped: false,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The request head (method, URI, headers, extensions).
    pub fn request(&self) -> &Parts {
        &self.request
    }

    /// The buffered request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn charset(&self) -> &str {
        &self.settings.charset
    }

    /// The canonical writer of this request.
    pub fn response(&self) -> &BufferedResponseWriter {
        &self.writer
    }

    pub fn response_mut(&mut self) -> &mut BufferedResponseWriter {
        &mut self.writer
    }

    /// Stop running the transactions still queued for this request.
    pub fn skip_transactions(&mut self) {
        if !self.transactions_skipped {
            metrics::record_transactions_skipped();
        }
        self.transactions_skipped = true;
    }

    pub fn transactions_skipped(&self) -> bool {
        self.transactions_skipped
    }

    /// Replace the whole response with the error response for `status`.
    ///
    /// The writer is reset and given `status`; then the registered handler
    /// runs, or the status' canonical reason is written as plain text.
    pub fn emit_error(&mut self, status: StatusCode) {
        self.writer.reset();
        self.writer.write_header(status);

        let handler = self.settings.error_handlers.get(status);
        match handler {
            Some(handler) => handler(self),
            None => {
                let content_type = format!("text/plain; charset={}", self.settings.charset);
                self.writer.set_content_type(&content_type);
                self.writer
                    .set_body_string(status.canonical_reason().unwrap_or("Unknown Status"));
            }
        }

        tracing::debug!(request_id = %self.request_id, status = %status, "Error emitted");
    }

    /// Run `pipe` as a transaction.
    ///
    /// Does nothing once transactions are skipped. Whatever the scope left in
    /// the transaction's writer is merged into the canonical writer, callbacks
    /// included. A panic inside `pipe` is contained: the transaction is
    /// completed as successful if it had not completed yet.
    pub fn begin_transaction<F>(&mut self, pipe: F)
    where
        F: FnOnce(&mut Transaction<'_>),
    {
        if self.transactions_skipped {
            tracing::debug!(request_id = %self.request_id, "Transaction skipped");
            return;
        }

        let request_id = self.request_id;
        let header_merge = self.settings.header_merge;

        let mut transaction = Transaction::new(self);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| pipe(&mut transaction))) {
            tracing::warn!(
                request_id = %request_id,
                panic = panic_message(&*payload),
                "Transaction interrupted"
            );
            if !transaction.is_completed() {
                transaction.succeed();
            }
        }

        let mut writer = transaction.into_response();
        writer.merge_into_with(&mut self.writer, header_merge);
    }

    /// Flush the response: drain before-flush callbacks in order, commit the
    /// canonical writer once, return it to the pool and build the final response.
    pub fn finish(mut self) -> Result<Response<Body>, ResponseError> {
        while let Some(callback) = self.writer.take_before_flush() {
            callback(&mut self);
        }

        let committed = self.writer.commit();
        let writer = std::mem::take(&mut self.writer);
        self.pool.release(writer);
        committed?;

        let response = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_response();
        Ok(response)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
