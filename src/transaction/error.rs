//! Transaction failure descriptor.

use axum::http::StatusCode;
use thiserror::Error;

/// Describes how a transaction ended.
///
/// Usable directly as the error of a transaction outcome to carry a status
/// code, a message and a content type. An empty `reason` means "no message:
/// let the registered error handler render the response".
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TransactionErrorResult {
    /// HTTP status code; 0 when unset.
    pub status_code: u16,
    /// Message sent to the client.
    pub reason: String,
    /// Content type override.
    pub content_type: String,
}

impl TransactionErrorResult {
    pub fn new(status_code: u16, reason: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            status_code,
            reason: reason.into(),
            content_type: content_type.into(),
        }
    }

    /// Status codes of 400 and above are failures.
    pub fn is_failure(&self) -> bool {
        self.status_code >= 400
    }

    /// The status as an HTTP status code. Codes outside 100..=999 map to 500.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_boundary() {
        assert!(!TransactionErrorResult::new(399, "", "").is_failure());
        assert!(TransactionErrorResult::new(400, "", "").is_failure());
        assert!(TransactionErrorResult::new(401, "", "").is_failure());
        assert!(!TransactionErrorResult::default().is_failure());
    }

    #[test]
    fn test_display_is_reason() {
        let err = TransactionErrorResult::new(503, "db down", "text/plain");
        assert_eq!(err.to_string(), "db down");
        assert_eq!(TransactionErrorResult::new(404, "", "").to_string(), "");
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(
            TransactionErrorResult::new(503, "", "").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            TransactionErrorResult::new(0, "", "").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
