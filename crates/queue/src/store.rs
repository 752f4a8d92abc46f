//! Stream store trait and types.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sentinel_core::Transaction;

use crate::error::QueueError;

/// A raw entry read from the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Store-assigned entry id (e.g. `1718000000000-0`).
    pub id: String,
    /// The `data` field (JSON transaction), if the entry carried one.
    pub data: Option<String>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Some(data.into()),
        }
    }

    /// Decode the `data` field into a validated [`Transaction`].
    pub fn decode(&self) -> Result<Transaction, QueueError> {
        let raw = self
            .data
            .as_deref()
            .ok_or_else(|| QueueError::Parse(format!("entry {} has no data field", self.id)))?;
        Transaction::from_json(raw)
            .map_err(|e| QueueError::Parse(format!("entry {}: {}", self.id, e)))
    }
}

/// Position in the stream. Owned by a single consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamCursor {
    /// `$`: only entries appended after the read starts.
    #[default]
    Latest,
    /// Entries strictly after this id.
    After(String),
}

impl StreamCursor {
    pub fn as_id(&self) -> &str {
        match self {
            StreamCursor::Latest => "$",
            StreamCursor::After(id) => id,
        }
    }
}

impl fmt::Display for StreamCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

/// Backend for the append-only stream and its idempotency markers.
///
/// `set_if_absent` must be atomic at the store: it is the only thing
/// preventing two producers from publishing the same id.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Set `key` only if it does not exist, expiring after `ttl`.
    /// Returns `true` when the key was newly set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, QueueError>;

    /// Append a single `data` field to `stream`, trimming to roughly `max_len`.
    /// Returns the generated entry id.
    async fn append(&self, stream: &str, max_len: usize, payload: &str) -> Result<String, QueueError>;

    /// Block until at least one entry exists after `cursor`, then return the batch.
    /// There is no timeout; callers race it against their own shutdown signal.
    async fn read_blocking(
        &self,
        stream: &str,
        cursor: &StreamCursor,
    ) -> Result<Vec<RawMessage>, QueueError>;

    /// Backend name for logs (e.g. "redis", "memory").
    fn provider(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_ids() {
        assert_eq!(StreamCursor::Latest.as_id(), "$");
        assert_eq!(StreamCursor::After("5-0".into()).as_id(), "5-0");
        assert_eq!(StreamCursor::default(), StreamCursor::Latest);
        assert_eq!(format!("{}", StreamCursor::Latest), "$");
    }

    #[test]
    fn decode_valid_entry() {
        let msg = RawMessage::new("1-0", r#"{"id":"t1","merchant":"Costco","amount":9.99}"#);
        let txn = msg.decode().unwrap();
        assert_eq!(txn.id, "t1");
        assert_eq!(txn.amount, 9.99);
    }

    #[test]
    fn decode_missing_data_field() {
        let msg = RawMessage {
            id: "1-0".into(),
            data: None,
        };
        let err = msg.decode().unwrap_err();
        assert!(matches!(err, QueueError::Parse(_)));
        assert!(err.to_string().contains("1-0"));
    }

    #[test]
    fn decode_invalid_json() {
        let msg = RawMessage::new("2-0", "not json");
        assert!(matches!(msg.decode(), Err(QueueError::Parse(_))));
    }
}
