//! The sync loop: resume from the watermark, fetch a batch, apply it, repeat.
//!
//! ```text
//! Resuming ──► Fetching ──► Applying ──► Fetching   (full batch: backlog, no wait)
//!    ▲            │            │
//!    │            ▼            ▼
//!    └──────── Idle ◄──────────┘                   (short/empty batch or error)
//! ```
//! A failed apply forgets the cursor, so the loop goes back through `Resuming`
//! after the wait. Any state goes to `Stopped` once the cancel token fires. Cancellation is
//! checked between steps, so an in-flight fetch or commit always finishes first.
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    address::AddressResolver,
    aggregate::Aggregator,
    cancel::CancelToken,
    record::BlockRecord,
    source::BlockSource,
    store::Store,
    timestamp::{Clock, HeightTimeEstimator},
};

/// How many blocks to request per fetch.
pub const DEFAULT_BATCH_SIZE: u64 = 10;

/// How long to wait when there is nothing new.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);

/// Loop settings, fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Blocks requested per fetch. A shorter reply means we reached the chain head.
    pub batch_size: u64,
    /// Idle wait between polling rounds.
    pub interval: Duration,
    /// Also persist every fetched record verbatim.
    pub sync_blocks: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
            sync_blocks: false,
        }
    }
}

/// A fetched, not yet applied, range of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Height requested as the range start.
    pub start: u64,
    /// Records returned, ascending.
    pub records: Vec<BlockRecord>,
}

/// States of the sync loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Derive the cursor from the durable watermark.
    Resuming,
    /// Request the next range from the source.
    Fetching,
    /// Aggregate a fetched batch.
    Applying(Batch),
    /// Wait out the poll interval.
    Idle,
    /// Cancelled; terminal.
    Stopped,
}

/// Single sequential ingestion worker.
pub struct SyncEngine<F, S, A, E, C> {
    source: F,
    aggregator: Aggregator<S, A, E, C>,
    config: SyncConfig,
    cursor: Option<u64>,
}

impl<F, S, A, E, C> SyncEngine<F, S, A, E, C>
where
    F: BlockSource,
    S: Store,
    A: AddressResolver,
    E: HeightTimeEstimator,
    C: Clock,
{
    /// Create an engine pulling from `source` into `aggregator`.
    pub fn new(source: F, aggregator: Aggregator<S, A, E, C>, config: SyncConfig) -> Self {
        Self {
            source,
            aggregator,
            config,
            cursor: None,
        }
    }

    /// Next height to fetch: the durable watermark + 1, or `None` until (re)resumed.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// The aggregation side of the engine.
    pub fn aggregator(&self) -> &Aggregator<S, A, E, C> {
        &self.aggregator
    }

    /// Run until `cancel` fires. Errors are logged and retried, never returned.
    pub async fn run(&mut self, cancel: &CancelToken) {
        let mut state = SyncState::Resuming;
        while state != SyncState::Stopped {
            state = self.step(state, cancel).await;
        }
        info!(cursor = ?self.cursor, "sync loop stopped");
    }

    /// Perform one transition out of `state`.
    pub async fn step(&mut self, state: SyncState, cancel: &CancelToken) -> SyncState {
        if cancel.is_cancelled() {
            return SyncState::Stopped;
        }
        match state {
            SyncState::Resuming => self.resume().await,
            SyncState::Fetching => self.fetch().await,
            SyncState::Applying(batch) => self.apply(batch).await,
            SyncState::Idle => self.idle(cancel).await,
            SyncState::Stopped => SyncState::Stopped,
        }
    }

    async fn resume(&mut self) -> SyncState {
        match self.aggregator.watermark().await {
            Ok(watermark) => {
                let start = watermark.map_or(0, |h| h + 1);
                info!(start, "resuming sync");
                self.cursor = Some(start);
                SyncState::Fetching
            }
            Err(e) => {
                warn!("error reading synced height: {}", e);
                SyncState::Idle
            }
        }
    }

    async fn fetch(&mut self) -> SyncState {
        let Some(start) = self.cursor else {
            return SyncState::Resuming;
        };
        let end = start + self.config.batch_size;
        debug!(start, end, "fetching block records");

        match self.source.fetch_block_records(start, end).await {
            Err(e) => {
                warn!(start, end, "error fetching block records: {}", e);
                SyncState::Idle
            }
            Ok(records) if records.is_empty() => {
                debug!(start, "no new blocks");
                SyncState::Idle
            }
            Ok(records) => SyncState::Applying(Batch { start, records }),
        }
    }

    async fn apply(&mut self, batch: Batch) -> SyncState {
        let count = batch.records.len() as u64;
        let caught_up = count < self.config.batch_size;

        match self
            .aggregator
            .apply_batch(batch.start, &batch.records, caught_up, self.config.sync_blocks)
            .await
        {
            Ok(watermark) => {
                self.cursor = Some(watermark + 1);
                info!(from = batch.start, to = watermark, count, "applied blocks");
                if caught_up {
                    SyncState::Idle
                } else {
                    SyncState::Fetching
                }
            }
            Err(e) => {
                warn!(start = batch.start, count, "error applying batch: {}", e);
                // The commit may have landed even though we saw an error; re-read the watermark.
                self.cursor = None;
                SyncState::Idle
            }
        }
    }

    async fn idle(&mut self, cancel: &CancelToken) -> SyncState {
        tokio::select! {
            _ = tokio::time::sleep(self.config.interval) => {
                if self.cursor.is_some() {
                    SyncState::Fetching
                } else {
                    SyncState::Resuming
                }
            }
            _ = cancel.cancelled() => SyncState::Stopped,
        }
    }
}
