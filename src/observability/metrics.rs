//! Metrics collection and exposition.
//!
//! # Metrics
//! - `composite_cache_requests_total` (counter): lookups by result (hit, miss, coalesced)
//! - `composite_cache_inserts_total` (counter): inserts by result (stored, rejected)
//! - `composite_cache_entries` (gauge): stored composites
//! - `composite_render_duration_seconds` (histogram): load + composite + encode time
//! - `composite_render_bytes` (histogram): encoded output size
//! - `composite_render_failures_total` (counter): failures by kind
//! - `http_requests_total` (counter): responses by route and status
//! - `http_request_duration_seconds` (histogram): handler latency by route
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed by `init_metrics`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("composite_cache_requests_total", "result" => result).increment(1);
}

pub fn record_cache_insert(stored: bool, entries: usize) {
    let result = if stored { "stored" } else { "rejected" };
    counter!("composite_cache_inserts_total", "result" => result).increment(1);
    gauge!("composite_cache_entries").set(entries as f64);
}

pub fn record_render(started: Instant, size: usize) {
    histogram!("composite_render_duration_seconds").record(started.elapsed().as_secs_f64());
    histogram!("composite_render_bytes").record(size as f64);
}

pub fn record_render_failure(kind: &'static str) {
    counter!("composite_render_failures_total", "kind" => kind).increment(1);
}

pub fn record_request(route: &'static str, status: u16, started: Instant) {
    counter!("http_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}
