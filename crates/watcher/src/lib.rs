pub mod error;
pub mod metrics;
pub mod watcher;

pub use error::LookupError;
pub use metrics::{
    spawn_metrics_server, spawn_reporter, CacheEvent, MetricsRecorder, MetricsSnapshot, PipelineMetrics,
};
pub use watcher::{Processed, Watcher};
