//! Error types for media operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching, transcoding or optimizing an image.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Fetch of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Truncated download of {url}: expected {expected} bytes, received {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{program} exited with status {exit_code:?}")]
    ToolFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a fetch failure error.
    pub fn fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::EncodeFailed(message.into())
    }

    /// Create a tool failure error.
    pub fn tool_failed(
        program: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            program: program.into(),
            exit_code,
            stderr,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for failures while retrieving the source (network, status, truncation).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            MediaError::FetchFailed { .. } | MediaError::HttpStatus { .. } | MediaError::Truncated { .. }
        )
    }
}
