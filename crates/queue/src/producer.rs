//! Producer loop: pull from a transaction source, publish, pace.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use sentinel_core::Transaction;

use crate::error::QueueError;
use crate::stream::TransactionStream;

#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Delay between publish attempts.
    pub speed: Duration,
    /// Stop after this many attempts (0 = unbounded).
    pub limit: u64,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(1000),
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub attempted: u64,
    pub published: u64,
    pub duplicates: u64,
}

/// Publish transactions from `source` until the limit is hit, the source
/// ends, or `shutdown` flips to `true`.
pub async fn run_producer<I>(
    stream: &TransactionStream,
    source: I,
    options: &ProducerOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<ProducerSummary, QueueError>
where
    I: IntoIterator<Item = Transaction>,
{
    let mut summary = ProducerSummary::default();

    if options.limit > 0 {
        info!(limit = options.limit, "Sentinel-L7: Monitoring layers (Limit: {})", options.limit);
    } else {
        info!("Sentinel-L7: Monitoring layers");
    }

    for transaction in source {
        if *shutdown.borrow() {
            break;
        }

        if stream.publish(&transaction).await? {
            summary.published += 1;
            info!(
                transaction_id = %transaction.id,
                "Streamed: [{}] {} | {} {:.2}",
                transaction.id,
                transaction.merchant,
                transaction.currency.as_deref().unwrap_or("N/A"),
                transaction.amount,
            );
        } else {
            summary.duplicates += 1;
            warn!(transaction_id = %transaction.id, "Duplicate skipped: {}", transaction.id);
        }
        summary.attempted += 1;

        if options.limit > 0 && summary.attempted >= options.limit {
            info!("Limit reached. Powering down.");
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(options.speed) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(
        attempted = summary.attempted,
        published = summary.published,
        duplicates = summary.duplicates,
        "producer stopped"
    );
    Ok(summary)
}
