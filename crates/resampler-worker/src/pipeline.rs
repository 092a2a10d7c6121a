//! Per-job pipeline: fetch once, then generate, optimize and upload each
//! size target in order.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use resampler_media::{optimize, Optimized, Recompressor, SourceFetcher, VariantGenerator};
use resampler_models::{ContentKey, Job, SizeTarget, DEFAULT_SIZE_TARGETS};
use resampler_storage::{UploadReceipt, Uploader};

use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::metrics;

/// Pipeline stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Decode,
    Encode,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed job, tagged with the stage and (if any) the size target it failed on.
#[derive(Debug, Error)]
#[error("{} failed{}: {}", .stage, target_suffix(.size_target), .error)]
pub struct JobFailure {
    pub stage: Stage,
    pub size_target: Option<u32>,
    #[source]
    pub error: WorkerError,
}

fn target_suffix(size_target: &Option<u32>) -> String {
    size_target
        .map(|bound| format!(" for size {}", bound))
        .unwrap_or_default()
}

impl JobFailure {
    fn new(stage: Stage, size_target: Option<u32>, error: impl Into<WorkerError>) -> Self {
        Self {
            stage,
            size_target,
            error: error.into(),
        }
    }
}

/// Terminal state of one size target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The source already fit within the bound; nothing was uploaded.
    Skipped { bound: u32 },
    Published {
        bound: u32,
        receipt: UploadReceipt,
        /// False when the optimizer degraded to the encoder's output.
        optimized: bool,
    },
}

impl TargetOutcome {
    pub fn bound(&self) -> u32 {
        match self {
            TargetOutcome::Skipped { bound } | TargetOutcome::Published { bound, .. } => *bound,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, TargetOutcome::Published { .. })
    }
}

/// Every size target of a job reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub content_key: ContentKey,
    pub outcomes: Vec<TargetOutcome>,
}

impl JobReport {
    pub fn published(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }
}

/// Composes fetcher, generator, optimizer and uploader for one job.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn SourceFetcher>,
    generator: VariantGenerator,
    optimizer: Arc<dyn Recompressor>,
    uploader: Uploader,
    targets: Vec<SizeTarget>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        generator: VariantGenerator,
        optimizer: Arc<dyn Recompressor>,
        uploader: Uploader,
    ) -> Self {
        Self {
            fetcher,
            generator,
            optimizer,
            uploader,
            targets: DEFAULT_SIZE_TARGETS.to_vec(),
        }
    }

    /// Replace the ordered size targets.
    pub fn with_targets(mut self, targets: Vec<SizeTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn targets(&self) -> &[SizeTarget] {
        &self.targets
    }

    /// Process one job end to end.
    ///
    /// Targets run sequentially in order. The first failure aborts the
    /// remaining targets; targets already published stay published.
    pub async fn process(&self, job: &Job, logger: &JobLogger) -> Result<JobReport, JobFailure> {
        let source = self
            .fetcher
            .fetch(&job.source_url)
            .await
            .map_err(|e| JobFailure::new(Stage::Fetch, None, e))?;
        logger.log_progress(&format!("fetched {} bytes", source.byte_len()));

        let bytes = source
            .read_bytes()
            .await
            .map_err(|e| JobFailure::new(Stage::Fetch, None, e))?;

        let generator = self.generator.clone();
        let prepared = tokio::task::spawn_blocking(move || generator.prepare(&bytes))
            .await
            .map_err(|e| JobFailure::new(Stage::Decode, None, e))?
            .map_err(|e| JobFailure::new(Stage::Decode, None, e))?;
        if prepared.alpha_degraded() {
            logger.log_warning("alpha channel unusable, encoding color channels as-is");
        }
        let (width, height) = prepared.dimensions();
        debug!(width, height, "Prepared source");
        let prepared = Arc::new(prepared);

        let mut outcomes = Vec::with_capacity(self.targets.len());
        for &target in &self.targets {
            let bound = target.bound;

            let generator = self.generator.clone();
            let image = Arc::clone(&prepared);
            let rendered = tokio::task::spawn_blocking(move || generator.render(&image, target))
                .await
                .map_err(|e| JobFailure::new(Stage::Encode, Some(bound), e))?
                .map_err(|e| JobFailure::new(Stage::Encode, Some(bound), e))?;

            let Some(variant) = rendered else {
                metrics::record_variant(bound, "skipped");
                outcomes.push(TargetOutcome::Skipped { bound });
                continue;
            };

            let optimized = optimize(self.optimizer.as_ref(), variant).await;
            let adopted = optimized.is_adopted();
            match &optimized {
                Optimized::Adopted { ratio_percent, .. } => {
                    metrics::record_optimizer(Some(*ratio_percent));
                }
                Optimized::Degraded { reason, .. } => {
                    metrics::record_optimizer(None);
                    logger.log_warning(&format!("size {} left unoptimized: {}", bound, reason));
                }
            }
            let variant = optimized.into_variant();

            let receipt = self
                .uploader
                .upload(&job.content_key, &variant)
                .await
                .map_err(|e| JobFailure::new(Stage::Upload, Some(bound), e))?;
            metrics::record_upload(target.destination.as_str(), receipt.byte_len);
            metrics::record_variant(bound, "published");
            logger.log_progress(&format!(
                "size {} published to {} ({} bytes)",
                bound, receipt.location, receipt.byte_len
            ));

            outcomes.push(TargetOutcome::Published {
                bound,
                receipt,
                optimized: adopted,
            });
        }

        // The source temp file is released only after every target was attempted.
        drop(source);

        Ok(JobReport {
            content_key: job.content_key.clone(),
            outcomes,
        })
    }
}
