//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Environment variables with no default anywhere in the worker's config.
pub const REQUIRED_ENV: &[&str] = &["S3_BUCKET", "DESTINATION_HOSTS"];

/// Upper bound on messages taken per receive.
pub const MAX_RECEIVE_BATCH: usize = 10;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Long-poll wait per receive
    pub receive_wait: Duration,
    /// Messages per receive (1..=10)
    pub receive_batch: usize,
    /// Pause after each receive iteration
    pub poll_interval: Duration,
    /// Source download timeout
    pub fetch_timeout: Duration,
    /// Prometheus listener address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/resampler"),
            receive_wait: Duration::from_secs(20),
            receive_batch: 1,
            poll_interval: Duration::from_millis(1000),
            fetch_timeout: Duration::from_secs(120),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let metrics_addr = match std::env::var("METRICS_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|e| {
                WorkerError::config_error(format!("invalid METRICS_ADDR '{}': {}", raw, e))
            })?),
            _ => None,
        };

        Ok(Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/resampler".to_string())
                .into(),
            receive_wait: Duration::from_secs(
                std::env::var("WORKER_RECEIVE_WAIT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            receive_batch: clamp_batch(
                std::env::var("WORKER_RECEIVE_BATCH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            fetch_timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            metrics_addr,
        })
    }
}

fn clamp_batch(requested: usize) -> usize {
    requested.clamp(1, MAX_RECEIVE_BATCH)
}
