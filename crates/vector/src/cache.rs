use async_trait::async_trait;
use thiserror::Error;

use crate::entry::{CacheMatch, CacheMetadata};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed vector index response: {0}")]
    Parse(String),

    #[error("vector index not configured: {0}")]
    NotConfigured(String),
}

/// Nearest-neighbour lookup over previously analysed fingerprints.
#[async_trait]
pub trait SemanticCache: Send + Sync {
    /// Best match among the `top_k` nearest neighbours, if it clears the
    /// similarity threshold (inclusive). A non-success response is a miss.
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Option<CacheMatch>, CacheError>;

    /// Write one point keyed by `id`. Returns whether the index accepted it.
    async fn upsert(&self, id: &str, vector: &[f32], metadata: &CacheMetadata) -> Result<bool, CacheError>;

    /// Backend name for logs.
    fn provider(&self) -> &str;
}
