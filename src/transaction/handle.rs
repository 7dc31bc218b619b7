//! The transaction handle given to handler code.

use axum::http::header;
use tower::BoxError;

use crate::context::RequestContext;
use crate::observability::metrics;
use crate::response::BufferedResponseWriter;
use crate::transaction::error::TransactionErrorResult;
use crate::transaction::scope::TransactionScope;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Completed,
}

/// One buffered unit of response writing.
///
/// Created by [`RequestContext::begin_transaction`]. Handler code writes into
/// [`Transaction::response_mut`] and ends the transaction with
/// [`Transaction::complete`].
pub struct Transaction<'a> {
    response: BufferedResponseWriter,
    context: &'a mut RequestContext,
    scope: TransactionScope,
    state: TransactionState,
    has_error: bool,
}

impl<'a> Transaction<'a> {
    /// Start a transaction on a clone of the context's writer. The clone keeps
    /// status and headers but starts with an empty body.
    pub(crate) fn new(context: &'a mut RequestContext) -> Self {
        let response = context.response().clone_without_body();
        let scope = context.settings().default_scope.clone();

        Self {
            response,
            context,
            scope,
            state: TransactionState::Active,
            has_error: false,
        }
    }

    pub fn response(&self) -> &BufferedResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut BufferedResponseWriter {
        &mut self.response
    }

    pub fn context(&self) -> &RequestContext {
        &*self.context
    }

    pub fn scope(&self) -> &TransactionScope {
        &self.scope
    }

    pub fn set_scope(&mut self, scope: TransactionScope) {
        self.scope = scope;
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == TransactionState::Completed
    }

    /// True once `complete` was called with an error.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Complete successfully. Shorthand for `complete(Ok(()))`.
    pub fn succeed(&mut self) -> bool {
        self.complete(Ok::<(), BoxError>(()))
    }

    /// End the transaction.
    ///
    /// The outcome is classified into a [`TransactionErrorResult`] and handed to
    /// the scope. Returns whether the remaining transactions of the request
    /// still run; when it is `false` the context skips them.
    ///
    /// Must be called once. Later calls are ignored with a warning; they do not
    /// re-run the scope and only report whether the chain still runs.
    pub fn complete<E>(&mut self, outcome: Result<(), E>) -> bool
    where
        E: Into<BoxError>,
    {
        if self.is_completed() {
            tracing::warn!(
                request_id = %self.context.request_id(),
                "Transaction already completed, ignoring"
            );
            return !self.context.transactions_skipped();
        }
        self.state = TransactionState::Completed;

        let result = match outcome {
            Ok(()) => TransactionErrorResult::default(),
            Err(err) => {
                self.has_error = true;
                self.classify(err.into())
            }
        };
        let failed = result.is_failure();

        let proceed = self
            .scope
            .end_transaction(&result, &mut self.response, self.context);
        if !proceed {
            self.context.skip_transactions();
        }

        metrics::record_transaction(self.scope.name(), failed);
        tracing::debug!(
            request_id = %self.context.request_id(),
            scope = self.scope.name(),
            status = result.status_code,
            failed,
            proceed,
            "Transaction completed"
        );
        proceed
    }

    /// Build the failure descriptor for `err`.
    fn classify(&self, err: BoxError) -> TransactionErrorResult {
        let mut result = TransactionErrorResult::new(
            400,
            err.to_string(),
            format!("text/plain; charset={}", self.context.charset()),
        );

        if let Some(structured) = err.downcast_ref::<TransactionErrorResult>() {
            if structured.status_code > 0 {
                result.status_code = structured.status_code;
            }
            if !structured.reason.is_empty() {
                result.reason = structured.reason.clone();
            }
            if !structured.content_type.is_empty() {
                result.content_type = structured.content_type.clone();
            } else if let Some(content_type) = self
                .response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
            {
                result.content_type = content_type.to_string();
            }
        }

        result
    }

    /// Hand the writer back to the context. Whatever the scope left in it is merged.
    pub(crate) fn into_response(self) -> BufferedResponseWriter {
        self.response
    }
}
