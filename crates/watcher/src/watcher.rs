//! Stream consumer: cache-augmented threat analysis per message.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use sentinel_core::{ThreatClassifier, ThreatResult, Transaction};
use sentinel_embedding::Embedder;
use sentinel_queue::{QueueError, RawMessage, StreamCursor, TransactionStream};
use sentinel_vector::{cache_id, CacheMatch, CacheMetadata, SemanticCache};

use crate::error::LookupError;
use crate::metrics::{CacheEvent, MetricsRecorder};

const DEFAULT_TOP_K: usize = 3;

/// Outcome of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub result: ThreatResult,
    pub path: CacheEvent,
}

enum Lookup {
    Hit(CacheMatch),
    Miss(Vec<f32>),
}

pub struct Watcher {
    stream: TransactionStream,
    embedder: Arc<dyn Embedder>,
    cache: Arc<dyn SemanticCache>,
    classifier: ThreatClassifier,
    metrics: Arc<dyn MetricsRecorder>,
    top_k: usize,
}

impl Watcher {
    pub fn new(
        stream: TransactionStream,
        embedder: Arc<dyn Embedder>,
        cache: Arc<dyn SemanticCache>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            stream,
            embedder,
            cache,
            classifier: ThreatClassifier::default(),
            metrics,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_classifier(mut self, classifier: ThreatClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Consume the stream until `shutdown` flips to `true`.
    ///
    /// Each wake-up's batch is processed in order before the next read.
    /// Stream store failures end the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<u64, QueueError> {
        info!(
            stream = self.stream.stream_key(),
            store = self.stream.provider(),
            embedder_dims = self.embedder.dimensions(),
            cache = self.cache.provider(),
            threshold = self.classifier.threshold(),
            "watcher started"
        );

        let mut processed = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                read = self.stream.read(&StreamCursor::Latest) => read?,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            processed += self.handle_batch(batch).await.len() as u64;
        }

        info!(processed, "watcher stopped");
        Ok(processed)
    }

    /// Decode and process every entry; malformed entries are skipped.
    pub async fn handle_batch(&self, batch: Vec<RawMessage>) -> Vec<Processed> {
        let mut out = Vec::with_capacity(batch.len());
        for message in batch {
            match message.decode() {
                Ok(transaction) => out.push(self.process(&transaction).await),
                Err(e) => warn!(entry_id = %message.id, error = %e, "skipping malformed stream entry"),
            }
        }
        out
    }

    /// Run one transaction through exactly one path and record one metric.
    pub async fn process(&self, transaction: &Transaction) -> Processed {
        let started = Instant::now();

        let (result, path) = match self.lookup(transaction).await {
            Ok(Lookup::Hit(cached)) => {
                debug!(
                    transaction_id = %transaction.id,
                    match_id = %cached.id,
                    score = cached.score,
                    "semantic cache hit"
                );
                (cached.to_result(transaction), CacheEvent::CacheHit)
            }
            Ok(Lookup::Miss(vector)) => {
                let result = self.classifier.analyze(transaction);
                self.remember(transaction, &vector, &result).await;
                (result, CacheEvent::CacheMiss)
            }
            Err(e) => {
                warn!(transaction_id = %transaction.id, error = %e, "cache unavailable, analysing directly");
                (self.classifier.analyze(transaction), CacheEvent::Fallback)
            }
        };

        report(&result, path);
        self.metrics
            .record(path, started.elapsed().as_millis() as u64);

        Processed { result, path }
    }

    async fn lookup(&self, transaction: &Transaction) -> Result<Lookup, LookupError> {
        let fingerprint = self.embedder.fingerprint(transaction);
        let vector = self.embedder.embed(&fingerprint).await?;
        match self.cache.search(&vector, self.top_k).await? {
            Some(hit) => Ok(Lookup::Hit(hit)),
            None => Ok(Lookup::Miss(vector)),
        }
    }

    /// Store a fresh analysis. Failures are logged; the message is already analysed.
    async fn remember(&self, transaction: &Transaction, vector: &[f32], result: &ThreatResult) {
        let id = cache_id(&transaction.id);
        let metadata = CacheMetadata::from_result(result, Utc::now());
        match self.cache.upsert(&id, vector, &metadata).await {
            Ok(true) => debug!(id = %id, "analysis cached"),
            Ok(false) => warn!(id = %id, "semantic cache rejected write"),
            Err(e) => warn!(id = %id, error = %e, "semantic cache write failed"),
        }
    }
}

fn report(result: &ThreatResult, path: CacheEvent) {
    let txn = &result.transaction;
    if result.is_threat {
        error!(transaction_id = %txn.id, path = %path, "THREAT: {}", result.message);
    } else {
        info!(transaction_id = %txn.id, path = %path, "{}", result.message);
    }
}
