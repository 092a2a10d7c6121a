//! Worker metrics.
//!
//! Recorded through the `metrics` facade; they go nowhere until a recorder
//! (the Prometheus exporter in the binary) is installed.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs finished, by outcome (`success`, `failure`, `malformed`).
    pub const JOBS_TOTAL: &str = "resampler_jobs_total";

    /// Size targets, by bound and outcome (`published`, `skipped`).
    pub const VARIANTS_TOTAL: &str = "resampler_variants_total";

    /// Optimizer runs, by outcome (`adopted`, `degraded`).
    pub const OPTIMIZER_TOTAL: &str = "resampler_optimizer_total";

    /// Optimized size as a percentage of the encoder's output.
    pub const OPTIMIZER_RATIO_PERCENT: &str = "resampler_optimizer_ratio_percent";

    /// Published variant sizes in bytes, by destination.
    pub const UPLOAD_BYTES: &str = "resampler_upload_bytes";

    /// Wall-clock time per job in seconds, by outcome.
    pub const JOB_DURATION_SECONDS: &str = "resampler_job_duration_seconds";
}

pub fn record_job(outcome: &'static str, elapsed: Duration) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_variant(bound: u32, outcome: &'static str) {
    counter!(
        names::VARIANTS_TOTAL,
        "size" => bound.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an optimizer run; `ratio_percent` is `None` when the tool was bypassed.
pub fn record_optimizer(ratio_percent: Option<u64>) {
    match ratio_percent {
        Some(ratio) => {
            counter!(names::OPTIMIZER_TOTAL, "outcome" => "adopted").increment(1);
            histogram!(names::OPTIMIZER_RATIO_PERCENT).record(ratio as f64);
        }
        None => counter!(names::OPTIMIZER_TOTAL, "outcome" => "degraded").increment(1),
    }
}

pub fn record_upload(destination: &'static str, bytes: usize) {
    histogram!(names::UPLOAD_BYTES, "destination" => destination).record(bytes as f64);
}
