//! Per-status error handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::context::RequestContext;

/// Renders a full replacement response for an error status.
///
/// When invoked the context's writer has already been reset and carries the
/// error status.
pub type ErrorHandler = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// Registry used by [`RequestContext::emit_error`].
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    handlers: HashMap<StatusCode, ErrorHandler>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `status`.
    pub fn register<F>(&mut self, status: StatusCode, handler: F)
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.handlers.insert(status, Arc::new(handler));
    }

    pub fn get(&self, status: StatusCode) -> Option<ErrorHandler> {
        self.handlers.get(&status).cloned()
    }

    pub fn contains(&self, status: StatusCode) -> bool {
        self.handlers.contains_key(&status)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut statuses: Vec<_> = self.handlers.keys().map(|s| s.as_u16()).collect();
        statuses.sort_unstable();
        f.debug_struct("ErrorHandlers")
            .field("statuses", &statuses)
            .finish()
    }
}
