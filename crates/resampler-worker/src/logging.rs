//! Structured job logging utilities.
//!
//! Every lifecycle event of a job carries the same `content_key` and
//! `delivery` fields, so one job's lines can be filtered out of the stream.

use tracing::{error, info, warn, Span};

use resampler_models::Job;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    content_key: String,
    delivery: String,
}

impl JobLogger {
    pub fn new(job: &Job) -> Self {
        Self {
            content_key: job.content_key.to_string(),
            delivery: job.delivery.to_string(),
        }
    }

    /// Logger for a message that never became a job (e.g. unparseable body).
    pub fn for_delivery(delivery: &str) -> Self {
        Self {
            content_key: String::new(),
            delivery: delivery.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            content_key = %self.content_key,
            delivery = %self.delivery,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            content_key = %self.content_key,
            delivery = %self.delivery,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            content_key = %self.content_key,
            delivery = %self.delivery,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            content_key = %self.content_key,
            delivery = %self.delivery,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            content_key = %self.content_key,
            delivery = %self.delivery,
            "Job completed: {}", message
        );
    }

    pub fn content_key(&self) -> &str {
        &self.content_key
    }

    pub fn delivery(&self) -> &str {
        &self.delivery
    }

    /// Span wrapping all work for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            content_key = %self.content_key,
            delivery = %self.delivery
        )
    }
}
