pub mod fingerprint;
pub mod gemini;
pub mod traits;

pub use fingerprint::fingerprint;
pub use gemini::GeminiEmbedder;
pub use traits::{Embedder, EmbeddingError};
