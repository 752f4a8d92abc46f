pub mod error;
pub mod memory;
pub mod producer;
pub mod redis_store;
pub mod store;
pub mod stream;

pub use error::QueueError;
pub use memory::MemoryStreamStore;
pub use producer::{run_producer, ProducerOptions, ProducerSummary};
pub use redis_store::RedisStreamStore;
pub use store::{RawMessage, StreamCursor, StreamStore};
pub use stream::TransactionStream;
