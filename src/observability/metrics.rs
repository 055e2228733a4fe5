//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by outcome, status
//! - `gateway_request_duration_seconds` (histogram): latency by outcome
//! - `gateway_upstream_errors_total` (counter): upstream failures by kind
//! - `gateway_snapshot_refresh_total` (counter): refreshes by snapshot, result
//! - `gateway_snapshot_rows` (gauge): rows in the visible snapshot
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder (tests, metrics disabled) every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request. `outcome` is the orchestration branch
/// (`alias_redirect`, `static_file`, `modified`, `direct`, ...).
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "outcome" => outcome, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_snapshot_refresh(snapshot: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("gateway_snapshot_refresh_total", "snapshot" => snapshot, "result" => result)
        .increment(1);
}

pub fn record_snapshot_rows(snapshot: &'static str, rows: usize) {
    gauge!("gateway_snapshot_rows", "snapshot" => snapshot).set(rows as f64);
}
