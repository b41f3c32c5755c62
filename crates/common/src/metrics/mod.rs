//! Metrics and observability utilities
//!
//! Prometheus metrics for the resolution waterfall, the paper source and
//! the knowledge store, with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all PaperHound metrics
pub const METRICS_PREFIX: &str = "paperhound";

/// Buckets for a full resolution (provider lookups plus download), in seconds
pub const RESOLUTION_BUCKETS: &[f64] = &[
    0.010, // cache hit
    0.100,
    0.500,
    1.000,
    2.500,
    5.000,
    10.00,
    30.00,
    60.00,
    120.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_provider_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "PDF provider attempts by provider and outcome"
    );

    describe_counter!(
        format!("{}_resolutions_total", METRICS_PREFIX),
        Unit::Count,
        "Finalized PDF resolutions by source"
    );

    describe_histogram!(
        format!("{}_resolution_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time to finalize a PDF resolution"
    );

    describe_counter!(
        format!("{}_pdf_validation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Downloaded files rejected by the validator"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total keyword searches against the paper source"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Keyword search latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of papers returned by the last search"
    );

    describe_counter!(
        format!("{}_upstream_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Upstream service failures after retries"
    );

    describe_counter!(
        format!("{}_papers_classified_total", METRICS_PREFIX),
        Unit::Count,
        "Papers filed into a maturity bucket"
    );

    describe_counter!(
        format!("{}_analysis_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Calls to the text analysis collaborator"
    );

    tracing::info!("Metrics registered");
}

/// One provider attempt. `outcome` is found, not_found or transient_error.
pub fn record_provider_attempt(provider: &str, outcome: &str) {
    counter!(
        format!("{}_provider_attempts_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// A finalized resolution. `source` is the winning provider, cache, or none.
pub fn record_resolution(source: &str, duration_secs: f64) {
    counter!(
        format!("{}_resolutions_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_resolution_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

pub fn record_validation_failure(provider: &str) {
    counter!(
        format!("{}_pdf_validation_failures_total", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, result_count: usize) {
    counter!(format!("{}_search_queries_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_search_results_count", METRICS_PREFIX)).set(result_count as f64);
}

pub fn record_upstream_error(service: &str) {
    counter!(
        format!("{}_upstream_errors_total", METRICS_PREFIX),
        "service" => service.to_string()
    )
    .increment(1);
}

pub fn record_classification(bucket: &str) {
    counter!(
        format!("{}_papers_classified_total", METRICS_PREFIX),
        "bucket" => bucket.to_string()
    )
    .increment(1);
}

pub fn record_analysis(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_analysis_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in RESOLUTION_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a silent no-op.
        register_metrics();
        record_provider_attempt("arxiv", "not_found");
        record_resolution("cache", 0.001);
        record_cache(true, "pdf");
        record_search(0.2, 5);
        record_classification("core");
    }
}
