//! Queue error types.

use thiserror::Error;

use sentinel_core::SentinelError;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The stream store could not be reached or rejected the command.
    #[error("stream store unavailable: {0}")]
    Unavailable(String),

    #[error("message parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::Unavailable(e.to_string())
    }
}

impl From<SentinelError> for QueueError {
    fn from(e: SentinelError) -> Self {
        QueueError::Serialize(e.to_string())
    }
}
