//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → request.rs (RequestContext: canonical writer acquired from the pool)
//!     → handler runs, opening transactions with begin_transaction
//!     → scopes call back: skip_transactions / emit_error (error_handlers.rs)
//!     → finish: before-flush callbacks → single commit → writer back to pool
//! ```

pub mod error_handlers;
pub mod request;

pub use error_handlers::{ErrorHandler, ErrorHandlers};
pub use request::{ContextSettings, RequestContext};
