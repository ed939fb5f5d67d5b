//! Metrics and observability utilities
//!
//! Describes reasoning, inference, and cache metrics through the `metrics`
//! facade. Installing an exporter is left to the embedding application.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all graphmind metrics
pub const METRICS_PREFIX: &str = "graphmind";

/// Register all metric descriptions
pub fn register_metrics() {
    // Reasoning metrics
    describe_counter!(
        format!("{}_reasoning_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of reasoning requests"
    );

    describe_histogram!(
        format!("{}_reasoning_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Reasoning latency in seconds"
    );

    describe_gauge!(
        format!("{}_reasoning_evidence_count", METRICS_PREFIX),
        Unit::Count,
        "Evidence items returned by the last reasoning request"
    );

    // Plan step metrics
    describe_counter!(
        format!("{}_plan_steps_total", METRICS_PREFIX),
        Unit::Count,
        "Total plan steps executed"
    );

    describe_counter!(
        format!("{}_plan_step_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Total plan steps that failed at the graph store"
    );

    // Inference metrics
    describe_counter!(
        format!("{}_inference_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total inference runs"
    );

    describe_counter!(
        format!("{}_inferred_relations_total", METRICS_PREFIX),
        Unit::Count,
        "Total relations produced by inference"
    );

    describe_histogram!(
        format!("{}_inference_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Inference latency in seconds"
    );

    // Cache metrics
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

    tracing::info!("Metrics registered");
}

/// Helper to record a finished reasoning request
pub fn record_reasoning(duration_secs: f64, evidence_count: usize, has_answer: bool) {
    let outcome = if has_answer { "answered" } else { "no_evidence" };

    counter!(
        format!("{}_reasoning_requests_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_reasoning_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_reasoning_evidence_count", METRICS_PREFIX)).set(evidence_count as f64);
}

/// Helper to record a single plan step
pub fn record_step(operation: &str, success: bool) {
    counter!(
        format!("{}_plan_steps_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);

    if !success {
        counter!(
            format!("{}_plan_step_failures_total", METRICS_PREFIX),
            "operation" => operation.to_string()
        )
        .increment(1);
    }
}

/// Helper to record an inference run
pub fn record_inference(duration_secs: f64, inferred: usize, cached: bool) {
    let source = if cached { "cache" } else { "computed" };

    counter!(
        format!("{}_inference_runs_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(1);

    if !cached {
        counter!(format!("{}_inferred_relations_total", METRICS_PREFIX)).increment(inferred as u64);
        histogram!(format!("{}_inference_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op
        register_metrics();
        record_reasoning(0.012, 3, true);
        record_step("traversal", false);
        record_inference(0.004, 2, false);
        record_cache(true, "inference");
    }
}
