//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::response::HeaderMerge;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Buffered response and transaction settings.
    pub response: ResponseConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Scope given to transactions that do not pick one explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[default]
    Transient,
    Request,
    Linked,
}

/// Buffered response configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Charset of the default `text/plain` content type used for unclassified errors.
    pub charset: String,

    /// Default transaction scope.
    pub default_scope: ScopeKind,

    /// Header merge rule applied when a transaction is committed.
    pub header_merge: HeaderMerge,

    /// Maximum number of idle writers kept for reuse.
    pub pool_max_idle: usize,

    /// Maximum buffered request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            charset: "UTF-8".to_string(),
            default_scope: ScopeKind::Transient,
            header_merge: HeaderMerge::Name,
            pool_max_idle: 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.response.charset, "UTF-8");
        assert_eq!(config.response.default_scope, ScopeKind::Transient);
        assert_eq!(config.response.header_merge, HeaderMerge::Name);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [response]
            default_scope = "linked"
            header_merge = "value"
            "#,
        )
        .unwrap();
        assert_eq!(config.response.default_scope, ScopeKind::Linked);
        assert_eq!(config.response.header_merge, HeaderMerge::Value);
        assert_eq!(config.response.charset, "UTF-8");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
