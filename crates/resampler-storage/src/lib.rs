//! Destinations for resampled variants.
//!
//! - S3 object store (public-read samples)
//! - Replicated copy to file-serving hosts (previews)
//! - [`Uploader`], which picks the destination from a variant's size target

pub mod error;
pub mod object_store;
pub mod replica;
pub mod uploader;

pub use error::{StorageError, StorageResult};
pub use object_store::{body_checksum, ObjectStore, S3Config, S3Store};
pub use replica::{parse_hosts, HostCopier, ReplicaConfig, ScpCopier};
pub use uploader::{UploadReceipt, Uploader, JPEG_CONTENT_TYPE};
