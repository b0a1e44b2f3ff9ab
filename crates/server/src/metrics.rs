use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::HeaderMap;
use axum::response::Response;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;

/// Metrics collects and exposes HTTP server and order workflow metrics.
pub struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    network_traffic_bytes: CounterVec,
    orders_created_total: IntCounter,
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let counter = CounterVec::new(Opts::new(name, help), labels)
        .unwrap_or_else(|e| panic!("Failed to create {name} metric: {e}"));
    registry
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("Failed to register {name} metric: {e}"));
    counter
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            &registry,
            "http_requests_total",
            "Total number of HTTP requests",
            &["method", "endpoint", "status"],
        );
        let errors_total = counter_vec(
            &registry,
            "errors_total",
            "Total number of rejected or failed requests by error kind",
            &["kind", "endpoint"],
        );
        let network_traffic_bytes = counter_vec(
            &registry,
            "network_traffic_bytes",
            "Network traffic in bytes",
            &["direction"],
        );

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total number of orders placed")
                .expect("Failed to create orders_created_total metric");
        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("Failed to register orders_created_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            network_traffic_bytes,
            orders_created_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, kind: &str, endpoint: &str) {
        self.errors_total.with_label_values(&[kind, endpoint]).inc();
    }

    fn record_network_traffic(&self, direction: &str, bytes: usize) {
        self.network_traffic_bytes
            .with_label_values(&[direction])
            .inc_by(bytes as f64);
    }

    pub fn record_order_created(&self) {
        self.orders_created_total.inc();
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

/// Middleware for collecting metrics on HTTP requests.
///
/// Requests are labelled with the matched route template (`/api/orders/{id}`)
/// so order ids do not end up as label values. Error responses produced by
/// [`crate::error::ApiError`] carry their kind, which becomes the error label.
pub async fn track(
    State(metrics): State<Arc<Metrics>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let incoming = content_length(req.headers());
    if incoming > 0 {
        metrics.record_network_traffic("in", incoming);
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed();

    let status = response.status().as_u16();
    metrics.record_request(&method, &endpoint, status, duration);
    if status >= 400 {
        let kind = response
            .extensions()
            .get::<ErrorKind>()
            .map(|k| k.0)
            .unwrap_or("http");
        metrics.record_error(kind, &endpoint);
    }

    let outgoing = content_length(response.headers());
    if outgoing > 0 {
        metrics.record_network_traffic("out", outgoing);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new();
        metrics.record_request("GET", "/health", 200, Duration::from_millis(3));
        metrics.record_error("TotalMismatch", "/api/orders");
        metrics.record_order_created();

        let text = metrics.render().unwrap();
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("endpoint=\"/health\""));
        assert!(text.contains("kind=\"TotalMismatch\""));
        assert!(text.contains("orders_created_total 1"));
    }
}
