//! Size targets and destination addressing.

use std::path::{Path, PathBuf};

use crate::job::ContentKey;

/// Quality factor for every encoded and optimized variant.
pub const OUTPUT_QUALITY: u8 = 90;

/// Where a finished variant is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Copied to the same path on every file-serving host.
    Preview,
    /// Put into the object store with public-read visibility.
    Sample,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Preview => "preview",
            Destination::Sample => "sample",
        }
    }
}

/// A maximum-dimension bound a variant must fit within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeTarget {
    /// Maximum width and height in pixels.
    pub bound: u32,
    pub destination: Destination,
}

impl SizeTarget {
    pub const fn new(bound: u32, destination: Destination) -> Self {
        Self { bound, destination }
    }
}

/// The fixed, ordered set of size targets, smallest first.
pub const DEFAULT_SIZE_TARGETS: [SizeTarget; 2] = [
    SizeTarget::new(150, Destination::Preview),
    SizeTarget::new(850, Destination::Sample),
];

/// Path of a preview on every file-serving host: `<preview_dir>/<contentKey>.jpg`.
pub fn preview_path(preview_dir: impl AsRef<Path>, content_key: &ContentKey) -> PathBuf {
    preview_dir
        .as_ref()
        .join(format!("{}.jpg", content_key.as_str()))
}

/// Object-store key of a sample: `sample/sample-<contentKey>.jpg`.
pub fn sample_key(content_key: &ContentKey) -> String {
    format!("sample/sample-{}.jpg", content_key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_are_ordered_smallest_first() {
        let bounds: Vec<u32> = DEFAULT_SIZE_TARGETS.iter().map(|t| t.bound).collect();
        assert_eq!(bounds, vec![150, 850]);
        assert_eq!(DEFAULT_SIZE_TARGETS[0].destination, Destination::Preview);
        assert_eq!(DEFAULT_SIZE_TARGETS[1].destination, Destination::Sample);
    }

    #[test]
    fn test_destination_labels() {
        assert_eq!(Destination::Preview.as_str(), "preview");
        assert_eq!(Destination::Sample.as_str(), "sample");
        assert_eq!(DEFAULT_SIZE_TARGETS[0].destination, Destination::Preview);
        assert_eq!(DEFAULT_SIZE_TARGETS[1].destination, Destination::Sample);
    }

    #[test]
    fn test_preview_path() {
        let key = ContentKey::parse("deadbeef").unwrap();
        assert_eq!(
            preview_path("/var/www/data/preview", &key),
            PathBuf::from("/var/www/data/preview/deadbeef.jpg")
        );
    }

    #[test]
    fn test_sample_key() {
        let key = ContentKey::parse("deadbeef").unwrap();
        assert_eq!(sample_key(&key), "sample/sample-deadbeef.jpg");
    }

    #[test]
    fn test_addressing_is_deterministic() {
        let a = ContentKey::parse("abc123").unwrap();
        let b = ContentKey::parse("abc123").unwrap();
        assert_eq!(sample_key(&a), sample_key(&b));
        assert_eq!(preview_path("/p", &a), preview_path("/p", &b));
    }
}
