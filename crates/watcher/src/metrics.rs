//! Per-path pipeline metrics and their HTTP exposure.
//!
//! Each processed message lands in exactly one path (cache hit, cache miss,
//! fallback). Every path keeps a count and an accumulated duration in
//! milliseconds. The collector is injected into the watcher through
//! [`MetricsRecorder`] so tests can swap it out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

// ── Events ───────────────────────────────────────────────────────────

/// The path a message took through the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvent {
    CacheHit,
    CacheMiss,
    Fallback,
}

impl CacheEvent {
    pub const ALL: [CacheEvent; 3] = [CacheEvent::CacheHit, CacheEvent::CacheMiss, CacheEvent::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::CacheHit => "cache_hit",
            CacheEvent::CacheMiss => "cache_miss",
            CacheEvent::Fallback => "fallback",
        }
    }

    /// Flat counter name, e.g. `sentinel_metrics_cache_hit_count`.
    pub fn count_key(&self) -> String {
        format!("sentinel_metrics_{}_count", self.as_str())
    }

    /// Flat duration name, e.g. `sentinel_metrics_cache_hit_ms`.
    pub fn duration_key(&self) -> String {
        format!("sentinel_metrics_{}_ms", self.as_str())
    }
}

impl std::fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for per-message path events.
pub trait MetricsRecorder: Send + Sync {
    fn record(&self, event: CacheEvent, duration_ms: u64);
}

// ── Collector ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counter {
    count: AtomicU64,
    total_ms: AtomicU64,
}

impl Counter {
    fn snapshot(&self) -> PathMetrics {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        PathMetrics {
            count,
            total_ms,
            avg_ms: if count == 0 { 0.0 } else { total_ms as f64 / count as f64 },
        }
    }
}

/// In-process collector; counters only ever increase.
#[derive(Debug)]
pub struct PipelineMetrics {
    cache_hit: Counter,
    cache_miss: Counter,
    fallback: Counter,
    start: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMetrics {
    pub count: u64,
    pub total_ms: u64,
    pub avg_ms: f64,
}

/// JSON body of `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hit: PathMetrics,
    pub cache_miss: PathMetrics,
    pub fallback: PathMetrics,
    pub processed: u64,
    /// Share of processed messages answered from the cache.
    pub hit_rate: f64,
    pub counters: BTreeMap<String, u64>,
    pub uptime_secs: f64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            cache_hit: Counter::default(),
            cache_miss: Counter::default(),
            fallback: Counter::default(),
            start: Instant::now(),
        }
    }

    fn counter(&self, event: CacheEvent) -> &Counter {
        match event {
            CacheEvent::CacheHit => &self.cache_hit,
            CacheEvent::CacheMiss => &self.cache_miss,
            CacheEvent::Fallback => &self.fallback,
        }
    }

    pub fn count(&self, event: CacheEvent) -> u64 {
        self.counter(event).count.load(Ordering::Relaxed)
    }

    pub fn total_ms(&self, event: CacheEvent) -> u64 {
        self.counter(event).total_ms.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        CacheEvent::ALL.iter().map(|e| self.count(*e)).sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hit = self.cache_hit.snapshot();
        let cache_miss = self.cache_miss.snapshot();
        let fallback = self.fallback.snapshot();
        let processed = cache_hit.count + cache_miss.count + fallback.count;

        let mut counters = BTreeMap::new();
        for event in CacheEvent::ALL {
            counters.insert(event.count_key(), self.count(event));
            counters.insert(event.duration_key(), self.total_ms(event));
        }

        MetricsSnapshot {
            hit_rate: if processed == 0 {
                0.0
            } else {
                cache_hit.count as f64 / processed as f64
            },
            cache_hit,
            cache_miss,
            fallback,
            processed,
            counters,
            uptime_secs: self.start.elapsed().as_secs_f64(),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            processed = s.processed,
            cache_hit = s.cache_hit.count,
            cache_miss = s.cache_miss.count,
            fallback = s.fallback.count,
            hit_avg_ms = s.cache_hit.avg_ms,
            miss_avg_ms = s.cache_miss.avg_ms,
            fallback_avg_ms = s.fallback.avg_ms,
            "pipeline metrics: hit rate {:.1}%",
            s.hit_rate * 100.0
        );
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for PipelineMetrics {
    fn record(&self, event: CacheEvent, duration_ms: u64) {
        let counter = self.counter(event);
        counter.count.fetch_add(1, Ordering::Relaxed);
        counter.total_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }
}

// ── HTTP server ──────────────────────────────────────────────────────

pub fn metrics_router(metrics: Arc<PipelineMetrics>) -> axum::Router {
    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(metrics)
}

/// Serve `GET /metrics` on `port` until `shutdown` flips to `true`.
pub fn spawn_metrics_server(
    port: u16,
    metrics: Arc<PipelineMetrics>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = metrics_router(metrics);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(port, error = %e, "failed to bind metrics HTTP server");
                return;
            }
        };

        info!(port, "metrics HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown))
            .await
            .ok();

        info!("metrics HTTP server stopped");
    })
}

/// Log a summary every `interval` until shutdown.
pub fn spawn_reporter(
    metrics: Arc<PipelineMetrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => metrics.log_summary(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<Arc<PipelineMetrics>>,
) -> axum::Json<MetricsSnapshot> {
    axum::Json(metrics.snapshot())
}

// ── Tests ────────────────────────────────────────────────────────────
