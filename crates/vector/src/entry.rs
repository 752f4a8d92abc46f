//! Cache entry types as stored in the vector index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentinel_core::{ThreatLevel, ThreatResult, Transaction};

/// Point id for the analysis of `transaction_id`.
pub fn cache_id(transaction_id: &str) -> String {
    format!("txn_{transaction_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    #[serde(rename = "isThreat")]
    pub is_threat: bool,
    #[serde(default)]
    pub message: String,
}

/// Metadata attached to every cached point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub analysis: CachedAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<ThreatLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CacheMetadata {
    pub fn from_result(result: &ThreatResult, at: DateTime<Utc>) -> Self {
        Self {
            analysis: CachedAnalysis {
                is_threat: result.is_threat,
                message: result.message.clone(),
            },
            threat_level: Some(result.threat_level()),
            timestamp: Some(at),
        }
    }
}

/// The best neighbour returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMatch {
    pub id: String,
    pub score: f64,
    pub metadata: CacheMetadata,
}

impl CacheMatch {
    /// Reuse the cached verdict for `transaction`.
    ///
    /// The match may belong to a different transaction; only its analysis
    /// carries over. A stored analysis without a message gets one naming the current merchant.
    pub fn to_result(&self, transaction: &Transaction) -> ThreatResult {
        let analysis = &self.metadata.analysis;
        if analysis.message.trim().is_empty() {
            if analysis.is_threat {
                let message = format!("Cached threat match at {}", transaction.merchant);
                return ThreatResult::threat(message, transaction.clone());
            }
            return ThreatResult::clear(transaction.clone());
        }
        ThreatResult {
            is_threat: analysis.is_threat,
            message: analysis.message.clone(),
            transaction: transaction.clone(),
        }
    }
}
