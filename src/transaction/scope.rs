//! Transaction scopes.
//!
//! # Built-in Scopes
//! - Transient: a failed transaction is discarded silently; the chain continues
//! - Request: a failed transaction replaces the whole final response with an
//!   error response at flush time; the chain stops
//! - Linked: a failed transaction vetoes the rest of the chain and leaves the
//!   already merged output as the final response
//!
//! The context merges whatever a scope leaves in the transaction's writer, so
//! discarding failed output is the scope's job.
//!
//! All scopes, including `Custom`, answer one question:
//! `(result, transaction writer, context) → continue chain?`

use std::fmt;
use std::sync::Arc;

use crate::config::schema::ScopeKind;
use crate::context::RequestContext;
use crate::response::BufferedResponseWriter;
use crate::transaction::error::TransactionErrorResult;

/// Shape of a user-defined scope.
pub type ScopeFn = dyn Fn(&TransactionErrorResult, &mut BufferedResponseWriter, &mut RequestContext) -> bool
    + Send
    + Sync;

/// Policy deciding a transaction's visibility and whether later transactions run.
#[derive(Clone, Default)]
pub enum TransactionScope {
    #[default]
    Transient,
    Request,
    Linked,
    Custom(Arc<ScopeFn>),
}

impl TransactionScope {
    /// Wrap a function as a scope.
    pub fn custom<F>(scope: F) -> Self
    where
        F: Fn(&TransactionErrorResult, &mut BufferedResponseWriter, &mut RequestContext) -> bool
            + Send
            + Sync
            + 'static,
    {
        TransactionScope::Custom(Arc::new(scope))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransactionScope::Transient => "transient",
            TransactionScope::Request => "request",
            TransactionScope::Linked => "linked",
            TransactionScope::Custom(_) => "custom",
        }
    }

    /// Apply the scope to a completed transaction. Returns whether the chain continues.
    pub fn end_transaction(
        &self,
        result: &TransactionErrorResult,
        response: &mut BufferedResponseWriter,
        context: &mut RequestContext,
    ) -> bool {
        match self {
            TransactionScope::Transient => {
                if result.is_failure() {
                    response.reset();
                }
                true
            }
            TransactionScope::Request => {
                if !result.is_failure() {
                    return true;
                }
                response.reset();
                let result = result.clone();
                response.set_before_flush(move |ctx| render_failure(&result, ctx));
                false
            }
            TransactionScope::Linked => {
                if result.is_failure() {
                    response.reset();
                    return false;
                }
                true
            }
            TransactionScope::Custom(scope) => scope(result, response, context),
        }
    }
}

/// Replace the final response with the failure. Runs at flush time, after the
/// normal flow and every other transaction have written.
fn render_failure(result: &TransactionErrorResult, ctx: &mut RequestContext) {
    if result.reason.is_empty() {
        ctx.emit_error(result.status());
        return;
    }

    let writer = ctx.response_mut();
    writer.reset();
    writer.set_body_string(result.reason.as_str());
    writer.write_header(result.status());
    if !result.content_type.is_empty() {
        writer.set_content_type(&result.content_type);
    }
}

impl From<ScopeKind> for TransactionScope {
    fn from(kind: ScopeKind) -> Self {
        match kind {
            ScopeKind::Transient => TransactionScope::Transient,
            ScopeKind::Request => TransactionScope::Request,
            ScopeKind::Linked => TransactionScope::Linked,
        }
    }
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
