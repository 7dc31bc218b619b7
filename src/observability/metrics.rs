//! Metrics collection and exposition.
//!
//! # Metrics
//! - `response_transactions_total` (counter): completed transactions by scope, outcome
//! - `response_transactions_skipped_total` (counter): requests whose chain was cut short
//! - `response_flushes_total` (counter): committed responses by status
//! - `response_writer_pool_idle` (gauge): idle writers in the pool

use std::net::SocketAddr;

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_transaction(scope: &'static str, failed: bool) {
    let outcome = if failed { "failure" } else { "success" };
    ::metrics::counter!("response_transactions_total", "scope" => scope, "outcome" => outcome)
        .increment(1);
}

pub fn record_transactions_skipped() {
    ::metrics::counter!("response_transactions_skipped_total").increment(1);
}

pub fn record_flush(status: StatusCode) {
    ::metrics::counter!("response_flushes_total", "status" => status.as_u16().to_string())
        .increment(1);
}

pub fn record_pool_idle(idle: usize) {
    ::metrics::gauge!("response_writer_pool_idle").set(idle as f64);
}
