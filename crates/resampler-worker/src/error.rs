//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid message: {0}")]
    Model(#[from] resampler_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] resampler_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] resampler_storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] resampler_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}

impl From<tokio::task::JoinError> for WorkerError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskFailed(e.to_string())
    }
}
