//! Encoded variants.

use crate::size_target::SizeTarget;

/// One resized, re-encoded rendition of a source image for one size target.
#[derive(Clone, PartialEq, Eq)]
pub struct Variant {
    pub target: SizeTarget,
    pub width: u32,
    pub height: u32,
    /// JPEG bytes.
    pub bytes: Vec<u8>,
}

impl Variant {
    pub fn new(target: SizeTarget, width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            target,
            width,
            height,
            bytes,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Same rendition with different encoded bytes (e.g. after optimization).
    pub fn with_bytes(&self, bytes: Vec<u8>) -> Self {
        Self {
            target: self.target,
            width: self.width,
            height: self.height,
            bytes,
        }
    }
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variant")
            .field("target", &self.target)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("byte_len", &self.bytes.len())
            .finish()
    }
}
