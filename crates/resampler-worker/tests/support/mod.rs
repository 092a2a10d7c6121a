//! In-memory collaborators for pipeline and consumer tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tempfile::TempDir;
use url::Url;

use resampler_media::{
    MediaError, MediaResult, Recompressor, SourceFetcher, SourceImage, VariantGenerator,
};
use resampler_models::DeliveryToken;
use resampler_queue::{MessageQueue, QueueResult, ReceivedMessage};
use resampler_storage::{HostCopier, ObjectStore, StorageError, StorageResult, Uploader};
use resampler_worker::{ConsumerSettings, Pipeline, QueueConsumer, ShutdownHandle};

pub const HOSTS: [&str; 2] = ["files1.example", "files2.example"];
pub const PREVIEW_DIR: &str = "/srv/preview";

/// Ordered record of side effects across all fakes.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Serves one fixed body for every URL, or fails like an unreachable host.
pub struct MemoryFetcher {
    pub body: Option<Vec<u8>>,
    pub dir: TempDir,
    pub calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            dir: tempfile::tempdir().unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            body: None,
            dir: tempfile::tempdir().unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> MediaResult<SourceImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => SourceImage::from_bytes(url.clone(), body, self.dir.path()),
            None => Err(MediaError::fetch_failed(url.as_str(), "connection refused")),
        }
    }
}

pub enum FakeOptimizer {
    /// Exit 0, output identical to input.
    PassThrough,
    /// Exit 0 with fixed output, whatever its size.
    Replace(Vec<u8>),
    /// Non-zero exit.
    Failing,
}

#[async_trait]
impl Recompressor for FakeOptimizer {
    async fn recompress(&self, jpeg: &[u8], _quality: u8) -> MediaResult<Vec<u8>> {
        match self {
            FakeOptimizer::PassThrough => Ok(jpeg.to_vec()),
            FakeOptimizer::Replace(bytes) => Ok(bytes.clone()),
            FakeOptimizer::Failing => Err(MediaError::tool_failed(
                "guetzli",
                Some(1),
                Some("Invalid input JPEG file".to_string()),
            )),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub puts: AtomicUsize,
    pub failing: bool,
    pub events: Events,
}

impl MemoryStore {
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_public(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StorageError::AwsSdk("service unavailable".to_string()));
        }
        self.events.push(format!("put:{}", key));
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCopier {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub events: Events,
}

impl MemoryCopier {
    pub fn copies(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl HostCopier for MemoryCopier {
    async fn copy(&self, local: &Path, host: &str, remote: &Path) -> StorageResult<()> {
        let target = format!("{}:{}", host, remote.display());
        self.events.push(format!("copy:{}", target));
        let bytes = std::fs::read(local)?;
        self.files.lock().unwrap().insert(target, bytes);
        Ok(())
    }
}

/// Queue holding a fixed list of messages, handed out once each.
#[derive(Default)]
pub struct FakeQueue {
    pub pending: Mutex<VecDeque<ReceivedMessage>>,
    pub deleted: Mutex<Vec<DeliveryToken>>,
    pub dead_letters: Mutex<Vec<(DeliveryToken, String, String)>>,
    pub receives: AtomicUsize,
    /// Triggered during the first receive, to stop the loop mid-iteration.
    pub stop_on_receive: Mutex<Option<ShutdownHandle>>,
    pub events: Events,
}

impl FakeQueue {
    pub fn with_bodies(bodies: &[&str], events: Events) -> Self {
        let pending = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| ReceivedMessage {
                token: DeliveryToken::new(format!("{}-0", i + 1)),
                body: body.to_string(),
                delivery_count: 1,
            })
            .collect();
        Self {
            pending: Mutex::new(pending),
            events,
            ..Default::default()
        }
    }

    pub fn deleted(&self) -> Vec<DeliveryToken> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageQueue for FakeQueue {
    async fn receive(
        &self,
        max_messages: usize,
        _wait: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.stop_on_receive.lock().unwrap().take() {
            handle.trigger();
        }
        let mut pending = self.pending.lock().unwrap();
        let n = max_messages.min(pending.len());
        Ok(pending.drain(..n).collect())
    }

    async fn delete(&self, token: &DeliveryToken) -> QueueResult<()> {
        self.events.push(format!("delete:{}", token));
        self.deleted.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn dead_letter(&self, token: &DeliveryToken, body: &str, reason: &str) -> QueueResult<()> {
        self.events.push(format!("dead_letter:{}", token));
        self.dead_letters
            .lock()
            .unwrap()
            .push((token.clone(), body.to_string(), reason.to_string()));
        Ok(())
    }
}

/// Fully wired pipeline over in-memory collaborators.
pub struct Harness {
    pub fetcher: Arc<MemoryFetcher>,
    pub store: Arc<MemoryStore>,
    pub copier: Arc<MemoryCopier>,
    pub events: Events,
    pub pipeline: Pipeline,
    pub work_dir: TempDir,
}

impl Harness {
    pub fn new(fetcher: MemoryFetcher, optimizer: FakeOptimizer) -> Self {
        Self::build(fetcher, optimizer, false)
    }

    pub fn with_failing_store(fetcher: MemoryFetcher, optimizer: FakeOptimizer) -> Self {
        Self::build(fetcher, optimizer, true)
    }

    fn build(fetcher: MemoryFetcher, optimizer: FakeOptimizer, store_fails: bool) -> Self {
        let events = Events::default();
        let work_dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(MemoryStore {
            failing: store_fails,
            events: events.clone(),
            ..Default::default()
        });
        let copier = Arc::new(MemoryCopier {
            events: events.clone(),
            ..Default::default()
        });

        let uploader = Uploader::new(
            store.clone(),
            copier.clone(),
            HOSTS.iter().map(|h| h.to_string()).collect(),
            PREVIEW_DIR,
            work_dir.path(),
        );
        let pipeline = Pipeline::new(
            fetcher.clone(),
            VariantGenerator::new(),
            Arc::new(optimizer),
            uploader,
        );

        Self {
            fetcher,
            store,
            copier,
            events,
            pipeline,
            work_dir,
        }
    }

    pub fn consumer(&self, queue: Arc<FakeQueue>) -> QueueConsumer {
        QueueConsumer::new(
            queue,
            self.pipeline.clone(),
            ConsumerSettings {
                receive_batch: 10,
                receive_wait: Duration::ZERO,
                poll_interval: Duration::from_millis(10),
            },
        )
    }
}
