//! Best-effort external JPEG re-compression.
//!
//! The optimizer never fails a job. The external tool's exit status is the
//! sole success signal: on exit 0 its output is adopted even when it is
//! larger than the input; on any malfunction (non-zero exit, timeout,
//! missing binary, I/O error) the pre-optimization variant is returned
//! byte-for-byte.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use resampler_models::{Variant, OUTPUT_QUALITY};

use crate::command::{ToolCommand, ToolRunner};
use crate::error::MediaResult;

/// External optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Optimizer executable, invoked as `<binary> [leading_args..] --quality <q> <in> <out>`.
    pub binary: String,
    /// Arguments placed before the quality flag (e.g. a wrapper's own flags).
    pub leading_args: Vec<String>,
    /// Wall-clock bound for one invocation.
    pub timeout: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            binary: "guetzli".to_string(),
            leading_args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl OptimizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("OPTIMIZER_BIN").unwrap_or_else(|_| "guetzli".to_string()),
            leading_args: Vec::new(),
            timeout: Duration::from_secs(
                std::env::var("OPTIMIZER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

/// Re-compresses encoded JPEG bytes at a target quality.
#[async_trait]
pub trait Recompressor: Send + Sync {
    async fn recompress(&self, jpeg: &[u8], quality: u8) -> MediaResult<Vec<u8>>;
}

/// Runs the configured optimizer binary against scoped temp files.
#[derive(Debug, Clone)]
pub struct ExternalOptimizer {
    config: OptimizerConfig,
    work_dir: PathBuf,
}

impl ExternalOptimizer {
    pub fn new(config: OptimizerConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl Recompressor for ExternalOptimizer {
    async fn recompress(&self, jpeg: &[u8], quality: u8) -> MediaResult<Vec<u8>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        // Both temp files are removed when they go out of scope, on every path.
        let input = tempfile::Builder::new()
            .prefix("variant-")
            .suffix(".jpg")
            .tempfile_in(&self.work_dir)?;
        let output = tempfile::Builder::new()
            .prefix("optimized-")
            .suffix(".jpg")
            .tempfile_in(&self.work_dir)?;

        tokio::fs::write(input.path(), jpeg).await?;

        let cmd = ToolCommand::new(&self.config.binary)
            .args(self.config.leading_args.iter().cloned())
            .arg("--quality")
            .arg(quality.to_string())
            .path_arg(input.path())
            .path_arg(output.path());

        ToolRunner::new()
            .with_timeout(self.config.timeout)
            .run(&cmd)
            .await?;

        Ok(tokio::fs::read(output.path()).await?)
    }
}

/// Outcome of optimizing one variant. Both arms carry a variant to upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimized {
    /// The tool succeeded and its output replaced the input.
    Adopted {
        variant: Variant,
        /// `100 * optimized_len / original_len`, for observability only.
        ratio_percent: u64,
    },
    /// The tool malfunctioned; the original variant is kept unchanged.
    Degraded { variant: Variant, reason: String },
}

impl Optimized {
    pub fn variant(&self) -> &Variant {
        match self {
            Optimized::Adopted { variant, .. } | Optimized::Degraded { variant, .. } => variant,
        }
    }

    pub fn into_variant(self) -> Variant {
        match self {
            Optimized::Adopted { variant, .. } | Optimized::Degraded { variant, .. } => variant,
        }
    }

    pub fn is_adopted(&self) -> bool {
        matches!(self, Optimized::Adopted { .. })
    }
}

/// Integer size ratio in percent; zero for an empty original.
pub fn size_ratio_percent(original_len: usize, optimized_len: usize) -> u64 {
    (100 * optimized_len as u64)
        .checked_div(original_len as u64)
        .unwrap_or(0)
}

/// Optimize a variant, falling back to the input on any malfunction.
pub async fn optimize(recompressor: &dyn Recompressor, variant: Variant) -> Optimized {
    match recompressor.recompress(&variant.bytes, OUTPUT_QUALITY).await {
        Ok(bytes) => {
            let ratio_percent = size_ratio_percent(variant.byte_len(), bytes.len());
            info!(
                bound = variant.target.bound,
                original = variant.byte_len(),
                optimized = bytes.len(),
                ratio = ratio_percent,
                "Optimized variant"
            );
            Optimized::Adopted {
                variant: variant.with_bytes(bytes),
                ratio_percent,
            }
        }
        Err(e) => {
            warn!(
                bound = variant.target.bound,
                "Optimizer failed, keeping unoptimized variant: {}", e
            );
            Optimized::Degraded {
                variant,
                reason: e.to_string(),
            }
        }
    }
}
