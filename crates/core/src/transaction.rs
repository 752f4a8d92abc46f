use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SentinelError;

/// A payment event flowing through the stream.
///
/// `id`, `merchant` and `amount` are required on the wire; everything else
/// is optional and rendered as a placeholder where it is absent. Optional
/// fields that fail to parse are read as absent rather than rejecting the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub merchant: String,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary amount, carried at 2-decimal precision.
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Display name, when the producer has one distinct from `merchant`.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
}

impl Transaction {
    /// Build a minimal transaction; optional fields start empty.
    pub fn new(id: impl Into<String>, merchant: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            merchant: merchant.into(),
            currency: None,
            amount: round_cents(amount),
            timestamp: None,
            kind: None,
            category: None,
            merchant_name: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse and validate a JSON payload from the stream.
    pub fn from_json(raw: &str) -> Result<Self, SentinelError> {
        let txn: Transaction = serde_json::from_str(raw)?;
        txn.validate()?;
        Ok(txn)
    }

    pub fn to_json(&self) -> Result<String, SentinelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Boundary guard: the classifier compares `amount` numerically and the
    /// stream keys idempotency on `id`, so both must be usable.
    pub fn validate(&self) -> Result<(), SentinelError> {
        if self.id.trim().is_empty() {
            return Err(SentinelError::InvalidTransaction("empty id".into()));
        }
        if !self.amount.is_finite() {
            return Err(SentinelError::InvalidTransaction(format!(
                "non-finite amount in {}",
                self.id
            )));
        }
        Ok(())
    }
}

/// Strings pass through; numbers and booleans are stringified; anything else is absent.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC. Anything else is absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Value::String(raw) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    Ok(["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc()))
}

/// Round to 2 decimal places.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
