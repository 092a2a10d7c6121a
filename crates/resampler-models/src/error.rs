//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Malformed message body: expected 2 comma-separated fields, found {0}")]
    FieldCount(usize),

    #[error("Invalid content key: {0}")]
    InvalidContentKey(String),

    #[error("Invalid source URL: {0}")]
    InvalidSourceUrl(String),
}

impl ModelError {
    pub fn invalid_content_key(msg: impl Into<String>) -> Self {
        Self::InvalidContentKey(msg.into())
    }

    pub fn invalid_source_url(msg: impl Into<String>) -> Self {
        Self::InvalidSourceUrl(msg.into())
    }
}
