//! Queue-agnostic message contract.

use std::time::Duration;

use async_trait::async_trait;

use resampler_models::DeliveryToken;

use crate::error::QueueResult;

/// A message handed out by [`MessageQueue::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Handle for [`MessageQueue::delete`]; opaque to everything but the queue.
    pub token: DeliveryToken,
    /// Raw `contentKey,sourceURL` body.
    pub body: String,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_count: u64,
}

/// At-least-once work queue.
///
/// A received message stays invisible to other consumers until it is
/// deleted or its visibility timeout elapses, after which it is redelivered.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting at most `wait`.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> QueueResult<Vec<ReceivedMessage>>;

    /// Acknowledge and remove a message. The only acknowledgment path.
    async fn delete(&self, token: &DeliveryToken) -> QueueResult<()>;

    /// Park a message that can never succeed, then delete it.
    async fn dead_letter(&self, token: &DeliveryToken, body: &str, reason: &str)
        -> QueueResult<()>;
}
