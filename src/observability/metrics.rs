//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (requests, latency, endpoint count)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `treeroute_requests_total` (counter): total requests by method, status, route
//! - `treeroute_request_duration_seconds` (histogram): time to response head
//! - `treeroute_endpoints` (gauge): live endpoints in the registry
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Route label is the display path, never the raw request path

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("treeroute_requests_total", "Total number of HTTP requests handled");
    describe_histogram!(
        "treeroute_request_duration_seconds",
        "Time from request arrival to response head"
    );
    describe_gauge!("treeroute_endpoints", "Endpoints currently registered");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "treeroute_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);

    histogram!(
        "treeroute_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn set_endpoint_count(count: usize) {
    gauge!("treeroute_endpoints").set(count as f64);
}
