//! Source image retrieval.
//!
//! The source is streamed into a scoped temporary file that keeps the
//! original filename extension. The file is removed when the
//! [`SourceImage`] is dropped, whether or not processing succeeded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Fetched source image held in a scoped temporary file.
#[derive(Debug)]
pub struct SourceImage {
    url: Url,
    file: NamedTempFile,
    byte_len: u64,
}

impl SourceImage {
    /// Wrap bytes that are already in memory (written to a temp file in `dir`).
    pub fn from_bytes(url: Url, bytes: &[u8], dir: impl AsRef<Path>) -> MediaResult<Self> {
        let file = temp_file_for(&url, dir.as_ref())?;
        std::fs::write(file.path(), bytes)?;
        Ok(Self {
            url,
            file,
            byte_len: bytes.len() as u64,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Read the original encoded bytes.
    pub async fn read_bytes(&self) -> MediaResult<Vec<u8>> {
        Ok(tokio::fs::read(self.file.path()).await?)
    }
}

/// Lower-cased extension of the URL path including the dot (e.g. `.png`).
pub fn url_extension(url: &Url) -> Option<String> {
    Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

fn temp_file_for(url: &Url, dir: &Path) -> MediaResult<NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let suffix = url_extension(url).unwrap_or_default();
    Ok(tempfile::Builder::new()
        .prefix("source-")
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

/// Retrieves a source image given its URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> MediaResult<SourceImage>;
}

/// HTTP(S) fetcher. No internal retry: a failed fetch fails the job.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    work_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("resampler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MediaError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            work_dir: work_dir.into(),
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> MediaResult<SourceImage> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MediaError::fetch_failed(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let file = temp_file_for(url, &self.work_dir)?;
        let mut out = tokio::fs::File::from_std(file.reopen()?);

        // hyper fails the body stream itself when the peer closes before
        // Content-Length bytes arrived; that case is reported as truncation.
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| match expected {
                Some(expected) if received < expected => MediaError::Truncated {
                    url: url.to_string(),
                    expected,
                    received,
                },
                _ => MediaError::fetch_failed(
                    url.as_str(),
                    format!("body interrupted after {} bytes: {}", received, e),
                ),
            })?;
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        out.flush().await?;

        if let Some(expected) = expected {
            if received != expected {
                return Err(MediaError::Truncated {
                    url: url.to_string(),
                    expected,
                    received,
                });
            }
        }

        info!(url = %url, bytes = received, "Fetched source image");

        Ok(SourceImage {
            url: url.clone(),
            file,
            byte_len: received,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(dir: &Path) -> HttpFetcher {
        HttpFetcher::new(dir, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_extension() {
        let url = Url::parse("https://example.com/images/a.PNG?x=1").unwrap();
        assert_eq!(url_extension(&url).as_deref(), Some(".png"));

        let url = Url::parse("https://example.com/images/noext").unwrap();
        assert_eq!(url_extension(&url), None);
    }

    #[tokio::test]
    async fn test_fetch_streams_to_temp_file_with_extension() {
        let server = MockServer::start().await;
        let body = vec![7u8; 4096];
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/a.png", server.uri())).unwrap();
        let source = fetcher(dir.path()).fetch(&url).await.unwrap();

        assert_eq!(source.byte_len(), 4096);
        assert!(source.path().to_string_lossy().ends_with(".png"));
        assert_eq!(source.read_bytes().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/missing.jpg", server.uri())).unwrap();
        let err = fetcher(dir.path()).fetch(&url).await.unwrap_err();

        assert!(matches!(err, MediaError::HttpStatus { status: 404, .. }));
        assert!(err.is_fetch_error());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("http://127.0.0.1:9/a.jpg").unwrap();
        let err = fetcher(dir.path()).fetch(&url).await.unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[tokio::test]
    async fn test_fetch_short_body_is_truncation() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nContent-Type: image/png\r\n\r\n")
                .await
                .unwrap();
            socket.write_all(&[1u8; 10]).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("http://{}/a.png", addr)).unwrap();
        let err = fetcher(dir.path()).fetch(&url).await.unwrap_err();

        assert!(err.is_fetch_error(), "{err}");
        assert!(
            matches!(err, MediaError::Truncated { expected: 100, received, .. } if received <= 10),
            "{err}"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_temp_file_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse("https://example.com/a.gif").unwrap();
        let source = SourceImage::from_bytes(url, b"GIF89a", dir.path()).unwrap();
        let path = source.path().to_path_buf();
        assert!(path.exists());

        drop(source);
        assert!(!path.exists());
    }
}
