use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
