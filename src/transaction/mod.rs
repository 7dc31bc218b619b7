//! Response transactions.
//!
//! A transaction is one buffered, independently committable unit of
//! response writing within a request.
//!
//! # Data Flow
//! ```text
//! RequestContext::begin_transaction
//!     → handle.rs (clone of the canonical writer, body cleared)
//!     → handler writes into transaction.response_mut()
//!     → Transaction::complete(outcome)
//!         → error.rs (classify the outcome into a TransactionErrorResult)
//!         → scope.rs (decide: discard / defer an error response / veto the chain)
//!     → context merges a successful transaction, or only its callbacks
//! ```
//!
//! # Design Decisions
//! - Scopes are a tagged enum with a `Custom` escape hatch, not a trait hierarchy
//! - Transient is the default scope: failures stay invisible unless opted in

pub mod error;
pub mod handle;
pub mod scope;

pub use error::TransactionErrorResult;
pub use handle::{Transaction, TransactionState};
pub use scope::{ScopeFn, TransactionScope};
