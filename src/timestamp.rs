//! Effective timestamps for blocks the node reports without one.
//!
//! Only transaction blocks carry a timestamp. To bucket the others into a day we
//! either take the wall clock (we are at the chain head, the block is brand new)
//! or estimate the time from the height (historical catch-up). The estimate is
//! used for daily bucketing only and is never stored as the block's time.
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};

/// Approximate unix time of mainnet height 0 (2021-03-19).
pub const MAINNET_GENESIS_TIMESTAMP: u64 = 1_616_162_400;

/// Target block interval on mainnet: 4608 blocks per day.
pub const MAINNET_BLOCK_INTERVAL_MS: u64 = 18_750;

/// Height to time estimate. Must be monotonic in `height`.
pub trait HeightTimeEstimator: Send + Sync {
    /// Estimated unix timestamp of the block at `height`.
    fn estimate(&self, height: u64) -> u64;
}

/// `genesis_timestamp + height * block_interval_ms / 1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearEstimator {
    /// Unix time of height 0.
    pub genesis_timestamp: u64,
    /// Expected milliseconds between blocks.
    pub block_interval_ms: u64,
}

impl Default for LinearEstimator {
    fn default() -> Self {
        Self {
            genesis_timestamp: MAINNET_GENESIS_TIMESTAMP,
            block_interval_ms: MAINNET_BLOCK_INTERVAL_MS,
        }
    }
}

impl HeightTimeEstimator for LinearEstimator {
    fn estimate(&self, height: u64) -> u64 {
        let elapsed_ms = u128::from(height) * u128::from(self.block_interval_ms);
        let elapsed = u64::try_from(elapsed_ms / 1000).unwrap_or(u64::MAX);
        self.genesis_timestamp.saturating_add(elapsed)
    }
}

/// Wall clock.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Picks the effective timestamp of a block.
#[derive(Debug, Clone, Default)]
pub struct TimestampResolver<E> {
    estimator: E,
}

impl<E: HeightTimeEstimator> TimestampResolver<E> {
    /// Resolver backed by `estimator`.
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    /// Effective timestamp of the block at `height`.
    ///
    /// A non-zero `reported` timestamp wins. Otherwise `now` when `caught_up`
    /// (the fetch came back short, so this block was just produced), else the
    /// height-based estimate.
    pub fn resolve(&self, height: u64, reported: Option<u64>, caught_up: bool, now: u64) -> u64 {
        match reported.filter(|&t| t != 0) {
            Some(t) => t,
            None if caught_up => now,
            None => self.estimator.estimate(height),
        }
    }
}

/// UTC calendar day of a unix timestamp.
pub fn utc_day(timestamp: u64) -> Result<NaiveDate> {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive())
        .ok_or(Error::InvalidTimestamp(timestamp))
}
