//! Destination dispatch for finished variants.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use resampler_models::{preview_path, sample_key, ContentKey, Destination, Variant};

use crate::error::{StorageError, StorageResult};
use crate::object_store::ObjectStore;
use crate::replica::HostCopier;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Where a variant ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub destination: Destination,
    /// Object key or remote path.
    pub location: String,
    pub byte_len: usize,
    /// Hosts written (empty for object-store puts).
    pub hosts: Vec<String>,
}

/// Publishes variants to the destination selected by their size target.
///
/// Every destination is addressed only by content key, so re-publishing the
/// same key overwrites in place.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    copier: Arc<dyn HostCopier>,
    hosts: Vec<String>,
    preview_dir: PathBuf,
    work_dir: PathBuf,
}

impl Uploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        copier: Arc<dyn HostCopier>,
        hosts: Vec<String>,
        preview_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            copier,
            hosts,
            preview_dir: preview_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Publish one variant. No retry; any failure fails the caller's job.
    pub async fn upload(
        &self,
        content_key: &ContentKey,
        variant: &Variant,
    ) -> StorageResult<UploadReceipt> {
        match variant.target.destination {
            Destination::Preview => self.replicate(content_key, variant).await,
            Destination::Sample => self.put_sample(content_key, variant).await,
        }
    }

    async fn put_sample(
        &self,
        content_key: &ContentKey,
        variant: &Variant,
    ) -> StorageResult<UploadReceipt> {
        let key = sample_key(content_key);
        info!(
            content_key = %content_key,
            size = variant.byte_len(),
            key = %key,
            "Uploading sample"
        );

        self.store
            .put_public(&key, variant.bytes.clone(), JPEG_CONTENT_TYPE)
            .await?;

        Ok(UploadReceipt {
            destination: Destination::Sample,
            location: key,
            byte_len: variant.byte_len(),
            hosts: Vec::new(),
        })
    }

    /// Copy to every host, attempting all of them even after a failure.
    ///
    /// Hosts that already received the file are not rolled back; the job is
    /// redelivered and the whole copy repeated.
    async fn replicate(
        &self,
        content_key: &ContentKey,
        variant: &Variant,
    ) -> StorageResult<UploadReceipt> {
        if self.hosts.is_empty() {
            return Err(StorageError::config_error("no destination hosts configured"));
        }

        let remote = preview_path(&self.preview_dir, content_key);
        info!(
            content_key = %content_key,
            size = variant.byte_len(),
            path = %remote.display(),
            hosts = self.hosts.len(),
            "Uploading preview"
        );

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let local = tempfile::Builder::new()
            .prefix("preview-")
            .suffix(".jpg")
            .tempfile_in(&self.work_dir)?;
        tokio::fs::write(local.path(), &variant.bytes).await?;

        let mut succeeded = Vec::with_capacity(self.hosts.len());
        let mut failed = Vec::new();
        for host in &self.hosts {
            match self.copier.copy(local.path(), host, &remote).await {
                Ok(()) => succeeded.push(host.clone()),
                Err(e) => {
                    warn!(content_key = %content_key, host = %host, "Preview copy failed: {}", e);
                    failed.push(host.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(StorageError::PartialReplication { failed, succeeded });
        }

        Ok(UploadReceipt {
            destination: Destination::Preview,
            location: remote.display().to_string(),
            byte_len: variant.byte_len(),
            hosts: succeeded,
        })
    }
}
