pub mod cache;
pub mod entry;
pub mod upstash;

pub use cache::{CacheError, SemanticCache};
pub use entry::{cache_id, CacheMatch, CacheMetadata, CachedAnalysis};
pub use upstash::UpstashCache;
