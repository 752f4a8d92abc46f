//! Rule-based threat classification.

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Outcome of analysing one transaction. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatResult {
    pub is_threat: bool,
    pub message: String,
    pub transaction: Transaction,
}

impl ThreatResult {
    pub fn threat(message: impl Into<String>, transaction: Transaction) -> Self {
        Self {
            is_threat: true,
            message: message.into(),
            transaction,
        }
    }

    pub fn clear(transaction: Transaction) -> Self {
        let message = format!("Layer 7 Clear: {} - OK", transaction.merchant);
        Self {
            is_threat: false,
            message,
            transaction,
        }
    }

    /// Label stored alongside cached analyses.
    pub fn threat_level(&self) -> ThreatLevel {
        if self.is_threat {
            ThreatLevel::High
        } else {
            ThreatLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    High,
}

/// Flags any transaction whose amount is strictly above the threshold.
#[derive(Debug, Clone, Copy)]
pub struct ThreatClassifier {
    threshold: f64,
}

impl ThreatClassifier {
    pub const DEFAULT_THRESHOLD: f64 = 400.00;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn analyze(&self, transaction: &Transaction) -> ThreatResult {
        if transaction.amount > self.threshold {
            let message = format!(
                "High value transaction at {} (${:.2})",
                transaction.merchant, transaction.amount
            );
            return ThreatResult::threat(message, transaction.clone());
        }
        ThreatResult::clear(transaction.clone())
    }
}

impl Default for ThreatClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
