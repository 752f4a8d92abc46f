use thiserror::Error;

use sentinel_embedding::EmbeddingError;
use sentinel_vector::CacheError;

/// A failure anywhere in the cache-augmented lookup. Always recovered by
/// classifying the message directly.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("semantic cache failed: {0}")]
    Cache(#[from] CacheError),
}
