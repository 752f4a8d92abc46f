//! Idempotent publish / blocking consume over a [`StreamStore`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use sentinel_core::config::RedisConfig;
use sentinel_core::Transaction;

use crate::error::QueueError;
use crate::store::{RawMessage, StreamCursor, StreamStore};

const MARKER_VALUE: &str = "processed";

/// The transaction stream as seen by producers and the watcher.
#[derive(Clone)]
pub struct TransactionStream {
    store: Arc<dyn StreamStore>,
    stream_key: String,
    max_len: usize,
    idempotency_ttl: Duration,
}

impl TransactionStream {
    pub fn new(store: Arc<dyn StreamStore>, config: &RedisConfig) -> Self {
        Self {
            store,
            stream_key: config.stream_key.clone(),
            max_len: config.stream_max_len,
            idempotency_ttl: Duration::from_secs(config.idempotency_ttl_secs),
        }
    }

    /// Marker key guarding duplicate publication of `transaction_id`.
    pub fn idempotency_key(transaction_id: &str) -> String {
        format!("idemp:{transaction_id}")
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub fn provider(&self) -> &str {
        self.store.provider()
    }

    /// Publish a transaction unless its id was already seen within the TTL.
    ///
    /// Returns `Ok(false)` for a duplicate; the stream is left untouched.
    pub async fn publish(&self, transaction: &Transaction) -> Result<bool, QueueError> {
        let payload = transaction.to_json()?;

        let key = Self::idempotency_key(&transaction.id);
        let is_new = self
            .store
            .set_if_absent(&key, MARKER_VALUE, self.idempotency_ttl)
            .await?;

        if !is_new {
            debug!(transaction_id = %transaction.id, "idempotency marker present");
            return Ok(false);
        }

        // A failed append leaves the marker behind: the id stays blocked until it expires.
        self.store
            .append(&self.stream_key, self.max_len, &payload)
            .await?;
        Ok(true)
    }

    /// Block until entries arrive after `cursor`; returns one wake-up's batch.
    pub async fn read(&self, cursor: &StreamCursor) -> Result<Vec<RawMessage>, QueueError> {
        self.store.read_blocking(&self.stream_key, cursor).await
    }
}
