/// Metrics and telemetry
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Caller name cache hit/miss rates and coalesced lookups
/// - Provider fetch outcomes
/// - Verification outcomes
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Cache Metrics ==========

    /// Cache hits by cache type
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type"]
    )
    .unwrap();

    /// Cache misses by cache type
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type"]
    )
    .unwrap();

    /// Lookups that joined a fetch already in flight
    pub static ref CACHE_COALESCED_TOTAL: IntCounter = register_int_counter!(
        "cache_coalesced_lookups_total",
        "Total number of lookups served by an in-flight provider fetch"
    )
    .unwrap();

    /// Cache size (stored rows, live or expired)
    pub static ref CACHE_SIZE: IntGauge = register_int_gauge!(
        "cache_size",
        "Number of entries in cache"
    )
    .unwrap();

    // ========== Provider Metrics ==========

    /// Caller-ID provider fetches by outcome
    pub static ref PROVIDER_FETCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "provider_fetches_total",
        "Total number of caller ID provider fetches",
        &["outcome"]
    )
    .unwrap();

    // ========== Verification Metrics ==========

    /// Verification results by status
    pub static ref VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "verifications_total",
        "Total number of identity verifications",
        &["status"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a cache access
pub fn record_cache_access(cache_type: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[cache_type]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[cache_type]).inc();
    }
}

/// Record a lookup that joined an in-flight fetch
pub fn record_coalesced_lookup() {
    CACHE_COALESCED_TOTAL.inc();
}

/// Record a provider fetch outcome ("found", "no_record", "unavailable")
pub fn record_provider_fetch(outcome: &str) {
    PROVIDER_FETCHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a verification result
pub fn record_verification(status: &str) {
    VERIFICATIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/lookup", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_cache_access() {
        record_cache_access("caller_name", true);
        record_cache_access("caller_name", false);
        record_coalesced_lookup();
        let metrics = render_metrics();
        assert!(metrics.contains("cache_hits_total"));
        assert!(metrics.contains("cache_misses_total"));
        assert!(metrics.contains("cache_coalesced_lookups_total"));
    }

    #[test]
    fn test_record_verification_and_provider() {
        record_provider_fetch("found");
        record_verification("verified");
        let metrics = render_metrics();
        assert!(metrics.contains("provider_fetches_total"));
        assert!(metrics.contains("verifications_total"));
    }

    #[test]
    fn test_record_background_job() {
        record_background_job("cache_purge", "success", 0.2);
        let metrics = render_metrics();
        assert!(metrics.contains("background_jobs_total"));
        assert!(metrics.contains("background_job_duration_seconds"));
    }
}
