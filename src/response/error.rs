//! Response writer error definitions.

use thiserror::Error;

/// Errors that can occur while operating on a buffered response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The real sink cannot hand over its connection.
    #[error("Hijack is not supported by this response writer")]
    HijackUnsupported,

    /// The buffered response was already written to the real sink.
    #[error("Response already committed")]
    AlreadyCommitted,

    /// The writer is not attached to a real sink (pooled writer).
    #[error("Response writer is detached from its sink")]
    Detached,

    /// The real sink failed while flushing buffered data.
    #[error("Flush failed: {0}")]
    Flush(String),

    /// The real sink failed while writing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for response operations.
pub type ResponseResult<T> = Result<T, ResponseError>;
