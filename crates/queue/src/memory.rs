//! In-process stream store.
//!
//! Same contract as the Redis backend: expiring set-if-absent markers,
//! a capped append-only stream per key, and a read that parks until an
//! entry lands after the cursor. Used by tests and single-process runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::QueueError;
use crate::store::{RawMessage, StreamCursor, StreamStore};

#[derive(Default)]
struct Inner {
    markers: HashMap<String, Instant>,
    streams: HashMap<String, Vec<(u64, String)>>,
    next_seq: u64,
}

pub struct MemoryStreamStore {
    inner: Mutex<Inner>,
    /// Latest sequence number appended to any stream.
    seq: watch::Sender<u64>,
    appends: AtomicUsize,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        let (seq, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner::default()),
            seq,
            appends: AtomicUsize::new(0),
        }
    }

    /// Total successful `append` calls.
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Entries currently retained for `stream`.
    pub fn stream_len(&self, stream: &str) -> usize {
        self.lock().streams.get(stream).map_or(0, Vec::len)
    }

    pub fn stream_is_empty(&self, stream: &str) -> bool {
        self.stream_len(stream) == 0
    }

    /// Idempotency markers currently held, expired ones included until the next insert.
    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking test thread; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn last_seq(&self, stream: &str) -> u64 {
        self.lock()
            .streams
            .get(stream)
            .and_then(|entries| entries.last())
            .map_or(0, |(seq, _)| *seq)
    }

    fn entries_after(&self, stream: &str, after: u64) -> Vec<RawMessage> {
        self.lock()
            .streams
            .get(stream)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(seq, _)| *seq > after)
                    .map(|(seq, data)| RawMessage::new(format_id(*seq), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryStreamStore {
    fn default() -> Self {
        Self::new()
    }
}

fn format_id(seq: u64) -> String {
    format!("{seq}-0")
}

fn parse_id(id: &str) -> Result<u64, QueueError> {
    id.split('-')
        .next()
        .and_then(|ms| ms.parse().ok())
        .ok_or_else(|| QueueError::Parse(format!("invalid stream id: {id}")))
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn set_if_absent(&self, key: &str, _value: &str, ttl: Duration) -> Result<bool, QueueError> {
        let mut inner = self.lock();
        let now = Instant::now();
        if let Some(expires_at) = inner.markers.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        inner.markers.retain(|_, expires_at| *expires_at > now);
        inner.markers.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn append(&self, stream: &str, max_len: usize, payload: &str) -> Result<String, QueueError> {
        let seq = {
            let mut inner = self.lock();
            inner.next_seq += 1;
            let seq = inner.next_seq;
            let entries = inner.streams.entry(stream.to_string()).or_default();
            entries.push((seq, payload.to_string()));
            if entries.len() > max_len {
                let excess = entries.len() - max_len;
                entries.drain(..excess);
            }
            seq
        };
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.seq.send_replace(seq);
        Ok(format_id(seq))
    }

    async fn read_blocking(
        &self,
        stream: &str,
        cursor: &StreamCursor,
    ) -> Result<Vec<RawMessage>, QueueError> {
        // Subscribe before sampling so an append in between still wakes us.
        let mut rx = self.seq.subscribe();
        let after = match cursor {
            StreamCursor::Latest => self.last_seq(stream),
            StreamCursor::After(id) => parse_id(id)?,
        };

        loop {
            let batch = self.entries_after(stream, after);
            if !batch.is_empty() {
                return Ok(batch);
            }
            if rx.changed().await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    fn provider(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::timeout;

    const STREAM: &str = "transactions";

    #[tokio::test]
    async fn marker_set_only_once() {
        let store = MemoryStreamStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("idemp:a", "processed", ttl).await.unwrap());
        assert!(!store.set_if_absent("idemp:a", "processed", ttl).await.unwrap());
        assert!(store.set_if_absent("idemp:b", "processed", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn marker_expires() {
        let store = MemoryStreamStore::new();
        let ttl = Duration::from_millis(10);
        assert!(store.set_if_absent("idemp:a", "processed", ttl).await.unwrap());
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.set_if_absent("idemp:a", "processed", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_markers_are_evicted() {
        let store = MemoryStreamStore::new();
        let short = Duration::from_millis(1);
        for i in 0..1000 {
            store.set_if_absent(&format!("idemp:{i}"), "processed", short).await.unwrap();
        }
        std::thread::sleep(Duration::from_millis(10));

        assert!(store
            .set_if_absent("idemp:fresh", "processed", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.marker_count(), 1);
    }

    #[tokio::test]
    async fn live_markers_survive_eviction() {
        let store = MemoryStreamStore::new();
        let ttl = Duration::from_secs(60);
        store.set_if_absent("idemp:a", "processed", ttl).await.unwrap();
        store.set_if_absent("idemp:b", "processed", ttl).await.unwrap();
        assert_eq!(store.marker_count(), 2);
        assert!(!store.set_if_absent("idemp:a", "processed", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn stream_len_tracks_appends() {
        let store = MemoryStreamStore::new();
        assert!(store.stream_is_empty(STREAM));
        store.append(STREAM, 10, "x").await.unwrap();
        assert_eq!(store.stream_len(STREAM), 1);
        assert!(!store.stream_is_empty(STREAM));
    }

    #[tokio::test]
    async fn append_trims_to_cap() {
        let store = MemoryStreamStore::new();
        for i in 0..15 {
            store.append(STREAM, 10, &format!("{i}")).await.unwrap();
        }
        assert_eq!(store.stream_len(STREAM), 10);
        assert_eq!(store.append_count(), 15);

        // Oldest entries went first.
        let all = store
            .read_blocking(STREAM, &StreamCursor::After("0-0".into()))
            .await
            .unwrap();
        assert_eq!(all.first().unwrap().data.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn read_after_cursor_returns_later_entries() {
        let store = MemoryStreamStore::new();
        let first = store.append(STREAM, 100, "a").await.unwrap();
        store.append(STREAM, 100, "b").await.unwrap();
        store.append(STREAM, 100, "c").await.unwrap();

        let batch = store
            .read_blocking(STREAM, &StreamCursor::After(first))
            .await
            .unwrap();
        let data: Vec<_> = batch.iter().filter_map(|m| m.data.clone()).collect();
        assert_eq!(data, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn latest_cursor_waits_for_new_entry() {
        let store = Arc::new(MemoryStreamStore::new());
        store.append(STREAM, 100, "old").await.unwrap();

        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.read_blocking(STREAM, &StreamCursor::Latest).await })
        };

        // Nothing new yet: the read stays parked.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        store.append(STREAM, 100, "new").await.unwrap();
        let batch = timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader timed out")
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].data.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn other_streams_do_not_wake_reader_with_data() {
        let store = Arc::new(MemoryStreamStore::new());
        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.read_blocking(STREAM, &StreamCursor::Latest).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.append("other", 100, "x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());
        reader.abort();
    }

    #[tokio::test]
    async fn rejects_malformed_cursor() {
        let store = MemoryStreamStore::new();
        let err = store
            .read_blocking(STREAM, &StreamCursor::After("abc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Parse(_)));
    }
}
