//! Shared data models for the resampler worker.
//!
//! This crate provides:
//! - Jobs and the `contentKey,sourceURL` message body codec
//! - Size targets and their destination classes
//! - Encoded variants
//! - Deterministic destination addressing per content key

pub mod error;
pub mod job;
pub mod size_target;
pub mod variant;

pub use error::{ModelError, ModelResult};
pub use job::{ContentKey, DeliveryToken, Job};
pub use size_target::{
    preview_path, sample_key, Destination, SizeTarget, DEFAULT_SIZE_TARGETS, OUTPUT_QUALITY,
};
pub use variant::Variant;
