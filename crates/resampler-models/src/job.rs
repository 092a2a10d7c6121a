//! Jobs and the queue message body codec.
//!
//! A message body is exactly two comma-separated UTF-8 fields,
//! `contentKey,sourceURL`, with no escaping. The content key is the only
//! identity used for destination addressing.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Content key of an image (e.g. an MD5 hex digest).
///
/// Validated so that it can be spliced into a file path or object key
/// without escaping the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    /// Validate and wrap a content key.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let key = raw.trim();

        if key.is_empty() {
            return Err(ModelError::invalid_content_key("empty"));
        }
        if key.contains("..") {
            return Err(ModelError::invalid_content_key(format!("{key:?} contains '..'")));
        }
        if let Some(c) = key
            .chars()
            .find(|c| matches!(c, '/' | '\\') || c.is_whitespace() || c.is_control())
        {
            return Err(ModelError::invalid_content_key(format!(
                "{key:?} contains {c:?}"
            )));
        }

        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque redelivery handle issued by the queue for one delivery of a message.
///
/// Owned by the consumer; the pipeline never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken(String);

impl DeliveryToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work derived from one queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub content_key: ContentKey,
    pub source_url: Url,
    pub delivery: DeliveryToken,
}

impl Job {
    /// Build a job from a received message body.
    pub fn from_message(delivery: DeliveryToken, body: &str) -> ModelResult<Self> {
        let (content_key, source_url) = parse_body(body)?;
        Ok(Self {
            content_key,
            source_url,
            delivery,
        })
    }

    /// Render the message body for this job (`contentKey,sourceURL`).
    pub fn message_body(&self) -> String {
        format_body(&self.content_key, &self.source_url)
    }
}

/// Parse a `contentKey,sourceURL` message body.
pub fn parse_body(body: &str) -> ModelResult<(ContentKey, Url)> {
    let fields: Vec<&str> = body.trim().split(',').collect();
    let [key, url] = fields.as_slice() else {
        return Err(ModelError::FieldCount(fields.len()));
    };

    let content_key = ContentKey::parse(key)?;

    let url = url.trim();
    let source_url =
        Url::parse(url).map_err(|e| ModelError::invalid_source_url(format!("{url:?}: {e}")))?;
    if !matches!(source_url.scheme(), "http" | "https") {
        return Err(ModelError::invalid_source_url(format!(
            "{url:?}: unsupported scheme {}",
            source_url.scheme()
        )));
    }

    Ok((content_key, source_url))
}

/// Render a message body.
pub fn format_body(content_key: &ContentKey, source_url: &Url) -> String {
    format!("{},{}", content_key, source_url)
}
