//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all JobBoard metrics
pub const METRICS_PREFIX: &str = "jobboard";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.100, // 100ms
    0.250, // 250ms - P99 target
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Buckets for picture processing (decode + two resizes)
pub const UPLOAD_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_jobs_written_total", METRICS_PREFIX),
        Unit::Count,
        "Job postings created, updated or deleted"
    );

    describe_counter!(
        format!("{}_resumes_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Resumes submitted against job postings"
    );

    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Picture uploads by outcome"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Picture processing latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a job write; `action` is `created`, `updated` or `deleted`
pub fn record_job_write(action: &'static str) {
    counter!(
        format!("{}_jobs_written_total", METRICS_PREFIX),
        "action" => action
    )
    .increment(1);
}

pub fn record_resume_submitted() {
    counter!(format!("{}_resumes_submitted_total", METRICS_PREFIX)).increment(1);
}

/// Record a picture upload
pub fn record_upload(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if success {
        histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}
