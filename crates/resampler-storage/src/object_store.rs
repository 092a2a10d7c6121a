//! S3 object store for sample variants.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// Region
    pub region: String,
    /// Custom S3-compatible endpoint; enables static credentials and path-style addressing
    pub endpoint_url: Option<String>,
    /// Access key ID (custom endpoint only)
    pub access_key_id: Option<String>,
    /// Secret access key (custom endpoint only)
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint_url = std::env::var("S3_ENDPOINT_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let (access_key_id, secret_access_key) = if endpoint_url.is_some() {
            (
                Some(std::env::var("S3_ACCESS_KEY_ID").map_err(|_| {
                    StorageError::config_error("S3_ACCESS_KEY_ID not set (required with S3_ENDPOINT_URL)")
                })?),
                Some(std::env::var("S3_SECRET_ACCESS_KEY").map_err(|_| {
                    StorageError::config_error(
                        "S3_SECRET_ACCESS_KEY not set (required with S3_ENDPOINT_URL)",
                    )
                })?),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            bucket: std::env::var("S3_BUCKET")
                .map_err(|_| StorageError::config_error("S3_BUCKET not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url,
            access_key_id,
            secret_access_key,
        })
    }
}

/// Write-only view of an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Put `bytes` under `key` with public-read visibility, overwriting any existing object.
    async fn put_public(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;
}

/// S3 (or S3-compatible) object store client.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region);

        let client = match config.endpoint_url {
            Some(endpoint_url) => {
                let (Some(access_key_id), Some(secret_access_key)) =
                    (config.access_key_id, config.secret_access_key)
                else {
                    return Err(StorageError::config_error(
                        "custom S3 endpoint requires static credentials",
                    ));
                };
                let credentials =
                    Credentials::new(access_key_id, secret_access_key, None, None, "resampler");

                let sdk_config = Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .endpoint_url(endpoint_url)
                    .region(region)
                    .credentials_provider(credentials)
                    .force_path_style(true)
                    .build();
                Client::from_conf(sdk_config)
            }
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Client::new(&shared)
            }
        };

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()?).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_public(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to s3://{}/{}", bytes.len(), self.bucket, key);

        let checksum = body_checksum(&bytes);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .checksum_sha256(checksum)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// Base64 SHA-256 digest sent with every put so the store rejects corrupted bodies.
pub fn body_checksum(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}
