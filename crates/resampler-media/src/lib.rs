//! Image fetching and transcoding for the resampler.
//!
//! This crate provides:
//! - Source download to scoped temp files with truncation detection
//! - Decode, alpha flattening and bound-fitted Lanczos resizing
//! - JPEG encoding behind a pluggable codec seam
//! - A fail-open wrapper around the external JPEG optimizer

pub mod alpha;
pub mod codec;
pub mod command;
pub mod error;
pub mod fetch;
pub mod generator;
pub mod optimizer;
pub mod scale;

pub use alpha::{flatten, Flattened, BACKGROUND};
pub use codec::{ImageCodec, StandardCodec};
pub use command::{check_tool, ToolCommand, ToolRunner};
pub use error::{MediaError, MediaResult};
pub use fetch::{HttpFetcher, SourceFetcher, SourceImage};
pub use generator::{PreparedImage, VariantGenerator};
pub use optimizer::{optimize, ExternalOptimizer, Optimized, OptimizerConfig, Recompressor};
pub use scale::{fits_within, scale_to_fit};
