use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::ServiceError;

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Remote Assessment Service
    pub static ref ASSESSMENT_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assessment_calls_total",
        "Total number of calls to the remote assessment service",
        &["operation", "outcome"]
    )
    .unwrap();

    pub static ref ASSESSMENT_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "assessment_call_duration_seconds",
        "Remote assessment call duration in seconds",
        &["operation"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref DEGRADED_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "degraded_fallbacks_total",
        "Number of times a local fallback replaced a remote result",
        &["operation"]
    )
    .unwrap();

    pub static ref STALE_RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stale_responses_total",
        "Remote responses discarded because the session moved on",
        &["operation"]
    )
    .unwrap();

    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "document_uploads_total",
        "Document uploads by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref WORKSPACES_ACTIVE: IntGauge = register_int_gauge!(
        "workspaces_active",
        "Number of documents currently loaded into a study workspace"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a remote assessment call with metrics
pub async fn track_assessment_call<F, T>(operation: &str, future: F) -> Result<T, ServiceError>
where
    F: std::future::Future<Output = Result<T, ServiceError>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let outcome = match &result {
        Ok(_) => "success",
        Err(ServiceError::Timeout) => "timeout",
        Err(ServiceError::Rejected(_)) => "rejected",
        Err(ServiceError::Malformed(_)) => "malformed",
        Err(_) => "error",
    };

    ASSESSMENT_CALLS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();

    ASSESSMENT_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

pub fn record_fallback(operation: &str) {
    DEGRADED_FALLBACKS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_stale_response(operation: &str) {
    STALE_RESPONSES_TOTAL.with_label_values(&[operation]).inc();
}
