//! Prometheus metrics for the querier
//!
//! Cache failures never fail a query, so these counters are the place where
//! they become visible.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Cache retrieves by outcome (hit, miss, error)
    pub static ref CACHE_RETRIEVES_TOTAL: CounterVec = register_counter_vec!(
        "querier_cache_retrieves_total",
        "Cache retrieve attempts by outcome",
        &["outcome"]
    ).expect("metric can be registered");

    /// Cache write-backs by outcome (stored, encode_error, store_error)
    pub static ref CACHE_WRITE_BACKS_TOTAL: CounterVec = register_counter_vec!(
        "querier_cache_write_backs_total",
        "Cache write-back attempts by outcome",
        &["outcome"]
    ).expect("metric can be registered");

    /// Cached payloads that failed to decode
    pub static ref CACHE_DECODE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "querier_cache_decode_errors_total",
        "Cached payloads that could not be decoded",
        &["shape"]
    ).expect("metric can be registered");

    /// Missing ranges executed against the store
    pub static ref MISSING_RANGES_TOTAL: CounterVec = register_counter_vec!(
        "querier_missing_ranges_total",
        "Missing ranges executed against the store",
        &["shape"]
    ).expect("metric can be registered");

    /// Sub-query results by status (success, error)
    pub static ref SUB_QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "querier_sub_queries_total",
        "Sub-query results by status",
        &["data_source", "status"]
    ).expect("metric can be registered");

    /// Sub-query latency from dispatch to result emission
    pub static ref SUB_QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "querier_sub_query_duration_seconds",
        "Sub-query latency in seconds",
        &["data_source"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).expect("metric can be registered");
}

/// Force registration of every metric
pub fn init() {
    lazy_static::initialize(&CACHE_RETRIEVES_TOTAL);
    lazy_static::initialize(&CACHE_WRITE_BACKS_TOTAL);
    lazy_static::initialize(&CACHE_DECODE_ERRORS_TOTAL);
    lazy_static::initialize(&MISSING_RANGES_TOTAL);
    lazy_static::initialize(&SUB_QUERIES_TOTAL);
    lazy_static::initialize(&SUB_QUERY_DURATION);
}

/// Gather all metrics in Prometheus text format
///
/// # Returns
///
/// Result containing the formatted metrics string, or an error if encoding fails
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a cache retrieve outcome
#[inline]
pub fn record_cache_retrieve(outcome: &str) {
    CACHE_RETRIEVES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a cache write-back outcome
#[inline]
pub fn record_cache_write_back(outcome: &str) {
    CACHE_WRITE_BACKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record an undecodable cached payload
#[inline]
pub fn record_cache_decode_error(shape: &str) {
    CACHE_DECODE_ERRORS_TOTAL.with_label_values(&[shape]).inc();
}

/// Record missing ranges sent to the store
#[inline]
pub fn record_missing_ranges(shape: &str, count: usize) {
    MISSING_RANGES_TOTAL
        .with_label_values(&[shape])
        .inc_by(count as f64);
}

/// Record a finished sub-query
#[inline]
pub fn record_sub_query(data_source: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    SUB_QUERIES_TOTAL
        .with_label_values(&[data_source, status])
        .inc();

    SUB_QUERY_DURATION
        .with_label_values(&[data_source])
        .observe(duration_secs);
}
