//! Message queue on Redis Streams with a consumer group.

use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use resampler_models::DeliveryToken;

use crate::error::{QueueError, QueueResult};
use crate::message::{MessageQueue, ReceivedMessage};

/// Stream entry field holding the message body.
pub const BODY_FIELD: &str = "body";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// This worker's consumer name within the group
    pub consumer_name: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Unacknowledged messages idle longer than this are redelivered
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "resampler:jobs".to_string(),
            consumer_group: "resampler:workers".to_string(),
            consumer_name: default_consumer_name(),
            dlq_stream_name: "resampler:dlq".to_string(),
            visibility_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "resampler:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "resampler:workers".to_string()),
            consumer_name: std::env::var("QUEUE_CONSUMER_NAME")
                .unwrap_or_else(|_| default_consumer_name()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "resampler:dlq".to_string()),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

fn default_consumer_name() -> String {
    format!("resampler-{}", uuid::Uuid::new_v4())
}

/// Redis Streams queue client.
pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisQueue {
    /// Create a new queue client. No connection is made until first use.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Append a message body to the job stream.
    pub async fn enqueue(&self, body: &str) -> QueueResult<DeliveryToken> {
        let mut conn = self.connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await?;

        debug!("Enqueued message {}", message_id);
        Ok(DeliveryToken::new(message_id))
    }

    /// Claim messages other consumers left unacknowledged past the visibility timeout.
    pub async fn reclaim(&self, count: usize) -> QueueResult<Vec<ReceivedMessage>> {
        let mut conn = self.connection().await?;
        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut claim = redis::cmd("XCLAIM");
        claim
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg(min_idle_ms);
        for entry in &pending.ids {
            claim.arg(&entry.id);
        }
        let claimed: StreamClaimReply = claim.query_async(&mut conn).await?;

        let mut messages = Vec::with_capacity(claimed.ids.len());
        for entry in claimed.ids {
            // XCLAIM itself counts as a delivery.
            let delivery_count = pending
                .ids
                .iter()
                .find(|p| p.id == entry.id)
                .map(|p| p.times_delivered as u64 + 1)
                .unwrap_or(2);
            info!(
                message_id = %entry.id,
                delivery_count,
                "Reclaimed unacknowledged message"
            );
            messages.push(to_message(entry, delivery_count));
        }

        Ok(messages)
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    async fn read_new(&self, count: usize, wait: Duration) -> QueueResult<Vec<ReceivedMessage>> {
        let mut conn = self.connection().await?;

        let mut read = redis::cmd("XREADGROUP");
        read.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(count);
        // BLOCK 0 would wait forever.
        if !wait.is_zero() {
            read.arg("BLOCK").arg(wait.as_millis() as u64);
        }
        read.arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">"); // Only new messages

        // Nil when the block elapses with nothing to read.
        let reply: Option<StreamReadReply> = read.query_async(&mut conn).await?;

        Ok(reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .map(|entry| to_message(entry, 1))
            .collect())
    }
}

fn to_message(entry: StreamId, delivery_count: u64) -> ReceivedMessage {
    let body = match entry.map.get(BODY_FIELD) {
        Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(redis::Value::SimpleString(s)) => s.clone(),
        _ => {
            warn!(message_id = %entry.id, "Message has no {} field", BODY_FIELD);
            String::new()
        }
    };

    ReceivedMessage {
        token: DeliveryToken::new(entry.id),
        body,
        delivery_count,
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        let max_messages = max_messages.max(1);

        let reclaimed = self.reclaim(max_messages).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        self.read_new(max_messages, wait).await
    }

    async fn delete(&self, token: &DeliveryToken) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(token.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(token.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Deleted message: {}", token);
        Ok(())
    }

    async fn dead_letter(
        &self,
        token: &DeliveryToken,
        body: &str,
        reason: &str,
    ) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .arg("error")
            .arg(reason)
            .arg("original_id")
            .arg(token.as_str())
            .query_async::<()>(&mut conn)
            .await?;

        self.delete(token).await?;

        warn!("Moved message {} to DLQ: {}", token, reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(id: &str, fields: &[(&str, redis::Value)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn body_field_becomes_message_body() {
        let message = to_message(
            entry(
                "1-0",
                &[(BODY_FIELD, redis::Value::BulkString(b"abc,https://x/a.png".to_vec()))],
            ),
            1,
        );

        assert_eq!(message.token.as_str(), "1-0");
        assert_eq!(message.body, "abc,https://x/a.png");
        assert_eq!(message.delivery_count, 1);
    }

    #[test]
    fn missing_body_is_empty() {
        let message = to_message(entry("2-0", &[]), 3);
        assert_eq!(message.body, "");
        assert_eq!(message.delivery_count, 3);
    }

    #[test]
    fn default_consumer_names_are_unique() {
        assert_ne!(default_consumer_name(), default_consumer_name());
    }
}
