use async_trait::async_trait;
use thiserror::Error;

use sentinel_core::Transaction;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini embedding failed: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider not configured: {0}")]
    NotConfigured(String),
}

/// Trait for embedding backends.
///
/// Implementations make one remote call per `embed` and never retry;
/// callers decide what a failure means.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Deterministic text summary of a transaction, used as embedding input.
    fn fingerprint(&self, transaction: &Transaction) -> String {
        crate::fingerprint::fingerprint(transaction)
    }

    /// Embed one text into a vector of `dimensions()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;
}
