use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::store::StoreStats;

/// Metric name prefix for all catalog server metrics
const PREFIX: &str = "metadata_catalog";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "route", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request latency in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "route"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Catalog Metrics
    pub static ref CATALOG_OPERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_operations_total"), "Catalog operations by outcome"),
        &["operation", "outcome"]
    ).expect("Failed to create operations_total metric");

    pub static ref CATALOG_OPERATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_operation_duration_seconds"),
            "Catalog operation latency in seconds"
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["operation"]
    ).expect("Failed to create operation_duration_seconds metric");

    pub static ref CATALOG_PATHS: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_paths"), "Known catalog paths"),
        &["state"]
    ).expect("Failed to create paths metric");

    pub static ref CATALOG_RECORDS: Gauge = Gauge::new(
        format!("{PREFIX}_records"),
        "Versioned records held in the store"
    ).expect("Failed to create records metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by type and route"),
        &["error_type", "route"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_OPERATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_OPERATION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_PATHS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_RECORDS.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Publish store counters
pub fn set_store_stats(stats: &StoreStats) {
    CATALOG_PATHS
        .with_label_values(&["all"])
        .set(stats.paths as f64);
    CATALOG_PATHS
        .with_label_values(&["live"])
        .set(stats.live_paths as f64);
    CATALOG_RECORDS.set(stats.records as f64);
}

/// Collapse a request path into a bounded set of route labels.
pub fn route_label(path: &str) -> &'static str {
    if path == "/" {
        return "/";
    }
    if path == "/catalog" || path == "/catalog/" {
        return "/catalog";
    }
    if !path.starts_with("/catalog/") {
        return "other";
    }
    if path.ends_with("/metadata") {
        "/catalog/{path}/metadata"
    } else if path.ends_with("/children") {
        "/catalog/{path}/children"
    } else if path.ends_with("/history") {
        "/catalog/{path}/history"
    } else {
        "/catalog/{path}"
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let route = route_label(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, route, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, route])
        .observe(duration.as_secs_f64());
}

/// Record a catalog operation and its outcome ("ok" or an error kind)
pub fn record_catalog_operation(operation: &str, outcome: &str, duration: Duration) {
    CATALOG_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();

    CATALOG_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record an error
pub fn record_error(error_type: &str, path: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, route_label(path)])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
