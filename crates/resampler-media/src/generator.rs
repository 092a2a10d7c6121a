//! Variant generation: decode, flatten, bound-check, resize, encode.
//!
//! Generation is CPU-bound and synchronous; async callers should run it on
//! a blocking thread.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, warn};

use resampler_models::{SizeTarget, Variant, OUTPUT_QUALITY};

use crate::alpha::{self, Flattened};
use crate::codec::{ImageCodec, StandardCodec};
use crate::error::MediaResult;
use crate::scale::{fits_within, scale_to_fit};

/// A decoded source flattened to opaque RGB, shared by every size target of a job.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    image: RgbImage,
    alpha_degraded: bool,
}

impl PreparedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// True when the alpha plane was unusable and the color channels were kept as-is.
    pub fn alpha_degraded(&self) -> bool {
        self.alpha_degraded
    }
}

/// Produces bound-fitted JPEG variants of a source image.
#[derive(Clone)]
pub struct VariantGenerator {
    codec: Arc<dyn ImageCodec>,
    quality: u8,
}

impl Default for VariantGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantGenerator {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(StandardCodec))
    }

    pub fn with_codec(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            quality: OUTPUT_QUALITY,
        }
    }

    /// Decode the source and normalize it to 3-channel RGB with no alpha.
    pub fn prepare(&self, source: &[u8]) -> MediaResult<PreparedImage> {
        let decoded = self.codec.decode(source)?;
        debug!(
            color = ?decoded.color(),
            "Decoded source image"
        );

        let flattened = alpha::flatten(decoded);
        let alpha_degraded = flattened.is_degraded();
        if let Flattened::Degraded { reason, .. } = &flattened {
            warn!("Alpha compositing skipped: {}", reason);
        }

        Ok(PreparedImage {
            image: flattened.into_image(),
            alpha_degraded,
        })
    }

    /// Render one size target.
    ///
    /// Returns `Ok(None)` when the source already fits within the bound: no
    /// variant is produced, so nothing is up-scaled or re-published.
    pub fn render(
        &self,
        prepared: &PreparedImage,
        target: SizeTarget,
    ) -> MediaResult<Option<Variant>> {
        let (width, height) = prepared.dimensions();
        if fits_within(width, height, target.bound) {
            debug!(
                bound = target.bound,
                width, height, "Source fits within bound, no variant"
            );
            return Ok(None);
        }

        let (new_width, new_height) = scale_to_fit(width, height, target.bound);
        let resized = imageops::resize(prepared.image(), new_width, new_height, FilterType::Lanczos3);
        let bytes = self.codec.encode_jpeg(&resized, self.quality)?;

        debug!(
            bound = target.bound,
            width = new_width,
            height = new_height,
            bytes = bytes.len(),
            "Rendered variant"
        );

        Ok(Some(Variant::new(target, new_width, new_height, bytes)))
    }

    /// Decode and render in one step.
    pub fn generate(&self, source: &[u8], target: SizeTarget) -> MediaResult<Option<Variant>> {
        let prepared = self.prepare(source)?;
        self.render(&prepared, target)
    }
}
