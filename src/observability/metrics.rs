//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status
//! - `relay_request_duration_seconds` (histogram): time to response headers
//! - `relay_bytes_proxied_total` (counter): response body bytes streamed
//! - `relay_route_reloads_total` (counter): reloads by outcome
//! - `relay_upstream_errors_total` (counter): failed dispatches by kind
//! - `relay_buffer_pool_active` / `relay_buffer_pool_idle` (gauges)
//!
//! Every recorder is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_bytes_proxied(bytes: u64) {
    counter!("relay_bytes_proxied_total").increment(bytes);
}

pub fn record_route_reload(outcome: &'static str) {
    counter!("relay_route_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("relay_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_buffer_pool(active: usize, idle: usize) {
    gauge!("relay_buffer_pool_active").set(active as f64);
    gauge!("relay_buffer_pool_idle").set(idle as f64);
}
