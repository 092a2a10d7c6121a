//! Image resampling worker binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resampler_media::{ExternalOptimizer, HttpFetcher, OptimizerConfig, VariantGenerator};
use resampler_queue::{QueueConfig, RedisQueue};
use resampler_storage::{ReplicaConfig, S3Store, ScpCopier, Uploader};
use resampler_worker::{
    ConsumerSettings, Pipeline, QueueConsumer, WorkerConfig, WorkerError, WorkerResult,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting resampler-worker");

    if let Err(e) = run().await {
        error!("Worker failed: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resampler=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> WorkerResult<()> {
    // Configuration is read once here and passed down explicitly.
    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))?;
        info!("Serving metrics on {}", addr);
    }

    tokio::fs::create_dir_all(&config.work_dir).await?;

    let queue = RedisQueue::new(QueueConfig::from_env())?;
    queue.init().await?;

    let replica = ReplicaConfig::from_env()?;
    info!(
        hosts = ?replica.hosts,
        preview_dir = %replica.preview_dir.display(),
        "Preview replication targets"
    );
    let store = S3Store::from_env().await?;
    info!("Sample bucket: {}", store.bucket());

    let uploader = Uploader::new(
        Arc::new(store),
        Arc::new(ScpCopier::from_config(&replica)),
        replica.hosts.clone(),
        replica.preview_dir.clone(),
        config.work_dir.clone(),
    );

    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new(config.work_dir.clone(), config.fetch_timeout)?),
        VariantGenerator::new(),
        Arc::new(ExternalOptimizer::new(
            OptimizerConfig::from_env(),
            config.work_dir.clone(),
        )),
        uploader,
    );

    let consumer = QueueConsumer::new(Arc::new(queue), pipeline, ConsumerSettings::from(&config));

    // Setup signal handler
    let shutdown = consumer.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current job");
            shutdown.trigger();
        }
    });

    consumer.run().await
}
