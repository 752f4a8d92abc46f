pub mod config;
pub mod error;
pub mod features;
pub mod generator;
pub mod threat;
pub mod transaction;

pub use config::Config;
pub use error::SentinelError;
pub use features::FeatureFlags;
pub use generator::TransactionGenerator;
pub use threat::{ThreatClassifier, ThreatLevel, ThreatResult};
pub use transaction::Transaction;
