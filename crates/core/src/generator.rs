//! Synthetic transaction source for the producer.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::error::SentinelError;
use crate::transaction::Transaction;

/// Amount bounds in cents: [1.00, 500.00].
const MIN_CENTS: u32 = 100;
const MAX_CENTS: u32 = 50_000;

/// Yields one fresh transaction per call; never runs dry.
///
/// All state lives in the struct, so a new generator is a full restart.
pub struct TransactionGenerator {
    merchants: Vec<String>,
    currencies: Vec<String>,
    rng: StdRng,
}

impl TransactionGenerator {
    pub fn new(config: &SimulationConfig) -> Result<Self, SentinelError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic amounts and picks (ids and timestamps stay fresh).
    pub fn seeded(config: &SimulationConfig, seed: u64) -> Result<Self, SentinelError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &SimulationConfig, rng: StdRng) -> Result<Self, SentinelError> {
        if config.merchants.is_empty() {
            return Err(SentinelError::Config("simulation merchant list is empty".into()));
        }
        if config.currencies.is_empty() {
            return Err(SentinelError::Config("simulation currency list is empty".into()));
        }
        Ok(Self {
            merchants: config.merchants.clone(),
            currencies: config.currencies.clone(),
            rng,
        })
    }

    pub fn next_transaction(&mut self) -> Transaction {
        // Lists are checked non-empty at construction.
        let merchant = self.merchants.choose(&mut self.rng).cloned().unwrap_or_default();
        let currency = self.currencies.choose(&mut self.rng).cloned().unwrap_or_default();
        let cents = self.rng.gen_range(MIN_CENTS..=MAX_CENTS);

        Transaction::new(Uuid::new_v4().to_string(), merchant, f64::from(cents) / 100.0)
            .with_currency(currency)
            .with_timestamp(Utc::now())
    }
}

impl Iterator for TransactionGenerator {
    type Item = Transaction;

    fn next(&mut self) -> Option<Transaction> {
        Some(self.next_transaction())
    }
}
