//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record a completed /favicons request.
pub fn record_request(status: u16, format: &str, start: Instant) {
    let labels = [
        ("status", status.to_string()),
        ("format", format.to_string()),
    ];
    counter!("favicon_requests_total", &labels).increment(1);
    histogram!("favicon_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a cache lookup outcome; `kind` is "orig" or "derived".
pub fn record_cache_hit(kind: &'static str) {
    counter!("favicon_cache_hits_total", "kind" => kind).increment(1);
}

pub fn record_cache_miss(kind: &'static str) {
    counter!("favicon_cache_misses_total", "kind" => kind).increment(1);
}

/// Record files removed by a janitor sweep.
pub fn record_cache_evictions(count: usize) {
    counter!("favicon_cache_evictions_total").increment(count as u64);
}

/// Record an origin fetch attempt.
pub fn record_origin_fetch(success: bool) {
    counter!("favicon_icon_fetches_total").increment(1);
    if !success {
        counter!("favicon_icon_fetch_errors_total").increment(1);
    }
}

/// Record how many candidates discovery produced for a page.
pub fn record_candidates_found(count: usize) {
    counter!("favicon_candidates_found_total").increment(count as u64);
}

/// Record that a request was answered with the fallback globe.
pub fn record_fallback_served() {
    counter!("favicon_fallbacks_served_total").increment(1);
}

/// Record a request refused by the rate limiter.
pub fn record_rate_limited() {
    counter!("favicon_rate_limited_total").increment(1);
}
