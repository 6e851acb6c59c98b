//! Metrics and observability utilities
//!
//! Emits through the `metrics` facade; the binary decides whether a
//! recorder is installed. Without one every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SAMAY metrics
pub const METRICS_PREFIX: &str = "samay";

/// Register all metric descriptions
pub fn register_metrics() {
    // Answer pipeline
    describe_counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions handled, labelled by outcome"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Latency of individual pipeline stages"
    );

    // Retrieval
    describe_counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval queries"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of passages returned from retrieval"
    );

    describe_counter!(
        format!("{}_rerank_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Re-ranking calls that produced no usable score"
    );

    // Embedding
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

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Generation
    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation API requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation latency in seconds"
    );

    // Indexing
    describe_counter!(
        format!("{}_passages_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total passages written to a corpus snapshot"
    );

    describe_histogram!(
        format!("{}_indexing_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Snapshot build latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Times one pipeline stage
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    /// Start timing a stage
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Record the stage duration and return it in seconds
    pub fn finish(self) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();
        histogram!(
            format!("{}_stage_duration_seconds", METRICS_PREFIX),
            "stage" => self.stage
        )
        .record(duration);
        duration
    }
}

/// Helper to record the outcome of one question
pub fn record_answer(outcome: &str) {
    counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, pool: &str, result_count: usize) {
    counter!(
        format!("{}_retrieval_queries_total", METRICS_PREFIX),
        "pool" => pool.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "pool" => pool.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        "pool" => pool.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record a re-ranking call that scored 0 for lack of a usable reply
pub fn record_rerank_failure(reason: &str) {
    counter!(
        format!("{}_rerank_failures_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
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
            "model" => model.to_string(),
            "batch" => if batch_size > 1 { "batch" } else { "single" }
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record generation metrics
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a snapshot build
pub fn record_indexing(duration_secs: f64, passages: usize, strategy: &str) {
    counter!(
        format!("{}_passages_indexed_total", METRICS_PREFIX),
        "strategy" => strategy.to_string()
    )
    .increment(passages as u64);

    histogram!(
        format!("{}_indexing_duration_seconds", METRICS_PREFIX)
    )
    .record(duration_secs);
}
