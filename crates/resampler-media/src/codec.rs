//! Image codec capability.
//!
//! Every input format goes through the same decode → resize → encode path.
//! A format-specific fast path would plug in as another [`ImageCodec`].

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};

use crate::error::{MediaError, MediaResult};

pub trait ImageCodec: Send + Sync {
    /// Decode encoded bytes, sniffing the format from the content.
    fn decode(&self, bytes: &[u8]) -> MediaResult<DynamicImage>;

    /// Encode an RGB buffer as baseline JPEG at `quality`.
    fn encode_jpeg(&self, image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>>;
}

/// Uniform codec backed by the `image` crate decoders and JPEG encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> MediaResult<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| MediaError::decode_failed(e.to_string()))
    }

    fn encode_jpeg(&self, image: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode_image(image)
            .map_err(|e| MediaError::encode_failed(e.to_string()))?;
        Ok(buf)
    }
}
