//! Applying a fetched batch to durable state.
//!
//! Split in two: [`Aggregator::plan`] decides every write a batch produces
//! (pure, no I/O), then [`Store::commit_batch`] applies them in one transaction.
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

use crate::{
    address::AddressResolver,
    error::{Error, Result},
    record::{BlockRecord, StoredBlock},
    store::Store,
    timestamp::{utc_day, Clock, HeightTimeEstimator, TimestampResolver},
};

/// All writes of one batch, committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWrites {
    /// Height of the first record; must equal the durable watermark + 1 (0 if none).
    pub start: u64,
    /// New watermark: height of the last record.
    pub watermark: u64,
    /// Increment per farmer address.
    pub totals: BTreeMap<String, u64>,
    /// Increment per (farmer address, UTC day).
    pub daily: BTreeMap<(String, NaiveDate), u64>,
    /// Enriched records to persist verbatim; empty unless block syncing is on.
    pub blocks: Vec<StoredBlock>,
}

/// Sole writer of counters, stored blocks and the watermark.
pub struct Aggregator<S, A, E, C> {
    store: S,
    addresses: A,
    timestamps: TimestampResolver<E>,
    clock: C,
}

impl<S, A, E, C> Aggregator<S, A, E, C>
where
    S: Store,
    A: AddressResolver,
    E: HeightTimeEstimator,
    C: Clock,
{
    /// Aggregator writing to `store`.
    pub fn new(store: S, addresses: A, estimator: E, clock: C) -> Self {
        Self {
            store,
            addresses,
            timestamps: TimestampResolver::new(estimator),
            clock,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Durable watermark, `None` before the first batch.
    pub async fn watermark(&self) -> Result<Option<u64>> {
        self.store.load_watermark().await
    }

    /// Apply `records` (heights `start..start + len`) and return the new watermark.
    ///
    /// `caught_up` means the fetch returned fewer records than requested.
    /// Nothing is written unless everything is.
    pub async fn apply_batch(
        &self,
        start: u64,
        records: &[BlockRecord],
        caught_up: bool,
        sync_blocks: bool,
    ) -> Result<u64> {
        let writes = self.plan(start, records, caught_up, sync_blocks)?;
        let watermark = writes.watermark;
        self.store.commit_batch(writes).await?;
        Ok(watermark)
    }

    /// Compute the writes for a batch without touching the store.
    pub fn plan(
        &self,
        start: u64,
        records: &[BlockRecord],
        caught_up: bool,
        sync_blocks: bool,
    ) -> Result<BatchWrites> {
        if records.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let now = self.clock.now();
        let mut writes = BatchWrites {
            start,
            watermark: start + records.len() as u64 - 1,
            ..Default::default()
        };

        for (expected, record) in (start..).zip(records) {
            if record.height != expected {
                return Err(Error::OutOfOrder {
                    expected,
                    got: record.height,
                });
            }

            let farmer = self.addresses.resolve(&record.farmer_puzzle_hash)?;
            *writes.totals.entry(farmer.clone()).or_default() += 1;

            let timestamp = self
                .timestamps
                .resolve(record.height, record.timestamp, caught_up, now);
            let day = utc_day(timestamp)?;
            *writes.daily.entry((farmer.clone(), day)).or_default() += 1;

            if sync_blocks {
                let pool_address = match self.addresses.resolve(&record.pool_puzzle_hash) {
                    Ok(address) => Some(address),
                    Err(e) => {
                        warn!(height = record.height, "pool puzzle hash not encoded: {}", e);
                        None
                    }
                };
                writes.blocks.push(StoredBlock {
                    record: record.clone(),
                    farmer_address: farmer,
                    pool_address,
                    is_transaction_block: record.is_transaction_block(),
                });
            }
        }

        Ok(writes)
    }
}
