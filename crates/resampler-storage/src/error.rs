//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while publishing a variant.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage: {0}")]
    ConfigError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Copy to {host} failed: {message}")]
    CopyFailed { host: String, message: String },

    #[error("Replication failed on {failed:?} (succeeded on {succeeded:?})")]
    PartialReplication {
        failed: Vec<String>,
        succeeded: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn copy_failed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CopyFailed {
            host: host.into(),
            message: message.into(),
        }
    }
}
