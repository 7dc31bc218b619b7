//! Buffered, rollback-capable HTTP response pipeline.
//!
//! A request runs through a chain of transactions. Each one writes a
//! tentative response into its own buffer; its scope decides whether that
//! output is committed, discarded or replaced by an error response, and
//! whether the rest of the chain still runs. The request's canonical writer
//! reaches the client exactly once, after every before-flush callback ran.

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod response;
pub mod transaction;

pub use config::AppConfig;
pub use context::{ErrorHandlers, RequestContext};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use response::{BufferedResponseWriter, HeaderMerge, ResponseError, WriterPool};
pub use transaction::{Transaction, TransactionErrorResult, TransactionScope};
