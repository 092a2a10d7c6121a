//! Image resampling worker.
//!
//! This crate provides:
//! - The per-job pipeline (fetch, generate, optimize, upload)
//! - The at-least-once queue consumer loop with cooperative shutdown
//! - Structured job logging and metrics

pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::WorkerConfig;
pub use consumer::{ConsumerSettings, MessageOutcome, QueueConsumer, ShutdownHandle};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{JobFailure, JobReport, Pipeline, Stage, TargetOutcome};
