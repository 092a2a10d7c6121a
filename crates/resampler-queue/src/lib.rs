//! Work queue for resample jobs.
//!
//! - [`MessageQueue`]: receive / delete / dead-letter contract the worker consumes
//! - [`RedisQueue`]: Redis Streams consumer-group implementation with
//!   visibility-timeout redelivery

pub mod error;
pub mod message;
pub mod redis_queue;

pub use error::{QueueError, QueueResult};
pub use message::{MessageQueue, ReceivedMessage};
pub use redis_queue::{QueueConfig, RedisQueue, BODY_FIELD};
