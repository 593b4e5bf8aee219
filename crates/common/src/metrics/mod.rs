//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the ingestion pipeline.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all DocForge metrics
pub const METRICS_PREFIX: &str = "docforge";

/// Histogram buckets for stage latency (in seconds); parsing and embedding
/// run well past typical request latencies
pub const STAGE_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 1m
    300.0, // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_jobs_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total ingestion jobs processed, by outcome"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Stage latency in seconds"
    );

    describe_counter!(
        format!("{}_pages_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages extracted"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_gauge!(
        format!("{}_outbox_depth", METRICS_PREFIX),
        Unit::Count,
        "Outbox rows still owed"
    );

    describe_counter!(
        format!("{}_outbox_deliveries_total", METRICS_PREFIX),
        Unit::Count,
        "Total outbox deliveries, by outcome"
    );

    tracing::info!("Metrics registered");
}

/// Record a finished job
pub fn record_job(outcome: &str, parser: &str, duration_secs: f64) {
    counter!(
        format!("{}_jobs_processed_total", METRICS_PREFIX),
        "outcome" => outcome.to_string(),
        "parser" => parser.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => "total".to_string()
    )
    .record(duration_secs);
}

/// Record one stage's latency
pub fn record_stage(stage: &str, duration_secs: f64) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);
}

/// Record extraction output volumes
pub fn record_extraction(pages: usize, chunks: usize) {
    counter!(format!("{}_pages_extracted_total", METRICS_PREFIX)).increment(pages as u64);
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks as u64);
}

/// Record an embedding provider call
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Record outbox poll state
pub fn record_outbox(depth: u64) {
    gauge!(format!("{}_outbox_depth", METRICS_PREFIX)).set(depth as f64);
}

/// Record one outbox delivery
pub fn record_delivery(outcome: &str) {
    counter!(
        format!("{}_outbox_deliveries_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in STAGE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_record_helpers_run() {
        record_job("done", "pdf", 1.5);
        record_stage("parsing", 0.3);
        record_extraction(5, 12);
        record_embedding(0.8, "text-embedding-3-small", true);
        record_outbox(3);
        record_delivery("processed");
    }
}
