//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! writer / transaction / context produce:
//!     → logging.rs (structured log events, request ID on every event)
//!     → metrics.rs (transaction outcomes, skips, flushes, pool size)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metrics go through the `metrics` facade; without an installed recorder they are no-ops
//! - Request ID flows through all log events of a request

pub mod logging;
pub mod metrics;
