//! Queue consumer loop.
//!
//! `Polling -> Dispatching -> (Acking | NotAcking) -> Polling`, stopping only
//! when shutdown is observed at the top of an iteration. A job in flight
//! always runs to completion or failure first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use resampler_models::Job;
use resampler_queue::{MessageQueue, ReceivedMessage};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::Pipeline;

/// Receive loop tuning.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub receive_batch: usize,
    pub receive_wait: Duration,
    pub poll_interval: Duration,
}

impl From<&WorkerConfig> for ConsumerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            receive_batch: config.receive_batch,
            receive_wait: config.receive_wait,
            poll_interval: config.poll_interval,
        }
    }
}

/// What happened to one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Processed and deleted.
    Acknowledged,
    /// Left on the queue for redelivery after the visibility timeout.
    Unacknowledged,
    /// Unparseable body, moved to the dead-letter stream.
    DeadLettered,
}

/// Cloneable trigger for a consumer's cooperative shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives the pipeline from the queue, one message at a time.
pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    pipeline: Pipeline,
    settings: ConsumerSettings,
    shutdown: Arc<watch::Sender<bool>>,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn MessageQueue>, pipeline: Pipeline, settings: ConsumerSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            pipeline,
            settings,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Request a stop at the next top-of-loop check.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run until shutdown is requested.
    ///
    /// Receive errors are logged and retried after the poll interval; they
    /// never end the loop.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            batch = self.settings.receive_batch,
            wait_secs = self.settings.receive_wait.as_secs(),
            "Starting queue consumer"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Shutdown signal received, stopping consumer");
                break;
            }

            match self.poll_once().await {
                Ok(outcomes) if !outcomes.is_empty() => {
                    debug!("Handled {} messages", outcomes.len());
                }
                Ok(_) => {}
                Err(e) => error!("Error receiving messages: {}", e),
            }

            // Pace the loop; a shutdown during the pause is seen at the top.
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = shutdown_rx.changed() => {}
            }
        }

        info!("Queue consumer stopped");
        Ok(())
    }

    /// One receive and the sequential handling of everything it returned.
    pub async fn poll_once(&self) -> WorkerResult<Vec<MessageOutcome>> {
        let messages = self
            .queue
            .receive(self.settings.receive_batch, self.settings.receive_wait)
            .await?;

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            outcomes.push(self.handle_message(message).await);
        }
        Ok(outcomes)
    }

    async fn handle_message(&self, message: ReceivedMessage) -> MessageOutcome {
        let started = Instant::now();

        let job = match Job::from_message(message.token.clone(), &message.body) {
            Ok(job) => job,
            Err(e) => {
                let logger = JobLogger::for_delivery(message.token.as_str());
                logger.log_error(&format!("malformed message {:?}: {}", message.body, e));
                metrics::record_job("malformed", started.elapsed());
                if let Err(dlq_err) = self
                    .queue
                    .dead_letter(&message.token, &message.body, &e.to_string())
                    .await
                {
                    error!("Failed to dead-letter {}: {}", message.token, dlq_err);
                    return MessageOutcome::Unacknowledged;
                }
                return MessageOutcome::DeadLettered;
            }
        };

        let logger = JobLogger::new(&job);
        let span = logger.create_span();

        async {
            if message.delivery_count > 1 {
                logger.log_warning(&format!("redelivery #{}", message.delivery_count));
            }
            logger.log_start(job.source_url.as_str());

            match self.pipeline.process(&job, &logger).await {
                Ok(report) => {
                    metrics::record_job("success", started.elapsed());
                    logger.log_completion(&format!(
                        "{} of {} sizes published in {:.2}s",
                        report.published(),
                        report.outcomes.len(),
                        started.elapsed().as_secs_f64()
                    ));

                    match self.queue.delete(&job.delivery).await {
                        Ok(()) => MessageOutcome::Acknowledged,
                        Err(e) => {
                            // Redelivery reprocesses idempotently.
                            warn!("Failed to delete message {}: {}", job.delivery, e);
                            MessageOutcome::Unacknowledged
                        }
                    }
                }
                Err(failure) => {
                    metrics::record_job("failure", started.elapsed());
                    logger.log_error(&failure.to_string());
                    MessageOutcome::Unacknowledged
                }
            }
        }
        .instrument(span)
        .await
    }
}
