//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): data-plane requests by method, status, routed
//! - `proxy_request_duration_seconds` (histogram): time to upstream response headers
//! - `proxy_upstream_errors_total` (counter): failed forwarding attempts
//! - `proxy_routes` (gauge): routing table size
//! - `proxy_websocket_connections` (gauge): open relayed WebSockets
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed data-plane request.
pub fn record_request(method: &str, status: u16, routed: bool, start: Instant) {
    let routed = if routed { "route" } else { "default" };
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "routed" => routed
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "routed" => routed)
        .record(start.elapsed().as_secs_f64());
}

/// Record a forwarding failure.
pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

/// Publish the current routing table size.
pub fn set_route_count(count: usize) {
    gauge!("proxy_routes").set(count as f64);
}

/// Counts one relayed WebSocket in `proxy_websocket_connections` for as
/// long as it is alive.
#[derive(Debug)]
pub struct OpenWebSocket(());

impl OpenWebSocket {
    pub fn new() -> Self {
        gauge!("proxy_websocket_connections").increment(1.0);
        Self(())
    }
}

impl Drop for OpenWebSocket {
    fn drop(&mut self) {
        gauge!("proxy_websocket_connections").decrement(1.0);
    }
}
