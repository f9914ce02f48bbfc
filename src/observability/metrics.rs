//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): HTTP requests by method, route, status
//! - `guard_request_duration_seconds` (histogram): HTTP latency
//! - `guard_rate_limited_total` (counter): rejected checks by action
//! - `guard_security_events_total` (counter): logged events by type and result
//! - `guard_alerts_total` (counter): threshold alerts by event type
//! - `guard_tracked_keys` (gauge): rate limiter entries after a sweep
//! - `guard_event_buffer_size` (gauge): buffered security events
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until `init_metrics` installs the exporter,
//!   so library users and tests pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "guard_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "guard_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(action: &'static str) {
    counter!("guard_rate_limited_total", "action" => action).increment(1);
}

pub fn record_security_event(event_type: &'static str, result: &'static str) {
    counter!("guard_security_events_total", "event_type" => event_type, "result" => result)
        .increment(1);
}

pub fn record_alert(event_type: &'static str) {
    counter!("guard_alerts_total", "event_type" => event_type).increment(1);
}

pub fn record_tracked_keys(count: usize) {
    gauge!("guard_tracked_keys").set(count as f64);
}

pub fn record_event_buffer(size: usize) {
    gauge!("guard_event_buffer_size").set(size as f64);
}
