//! Prometheus metrics for the HTTP/WebSocket surface.
//!
//! Core workflow metrics live in `pledgedesk_core::metrics` and are
//! registered into the same registry here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pledgedesk_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

// =============================================================================
// Push Channel Metrics
// =============================================================================

/// Active push-channel WebSocket connections.
pub static PUSH_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "pledgedesk_push_connections_active",
        "Number of active push-channel connections",
    )
    .unwrap()
});

/// Total push-channel connections (cumulative).
pub static PUSH_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pledgedesk_push_connections_total",
        "Total push-channel connections since startup",
    )
    .unwrap()
});

/// Push frames received by parse outcome.
pub static PUSH_FRAMES_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pledgedesk_push_frames_received_total",
            "Push frames received over the channel",
        ),
        &["outcome"], // "forwarded", "malformed", "dropped"
    )
    .unwrap()
});

/// Register all metrics with the registry.
fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(PUSH_CONNECTIONS_ACTIVE.clone()),
        Box::new(PUSH_CONNECTIONS_TOTAL.clone()),
        Box::new(PUSH_FRAMES_RECEIVED.clone()),
    ];
    for collector in collectors
        .into_iter()
        .chain(pledgedesk_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(collector) {
            tracing::warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_core_and_server_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/health", "200"])
            .inc();
        pledgedesk_core::metrics::SESSIONS_STARTED
            .with_label_values(&["renewal"])
            .inc();

        let output = gather_metrics();
        assert!(output.contains("pledgedesk_http_requests_total"));
        assert!(output.contains("pledgedesk_sessions_started_total"));
    }
}
