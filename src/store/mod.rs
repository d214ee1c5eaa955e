//! Persistence interfaces and implementations used by the engine
//! (watermark, farmer counters, and optionally the raw block records).
use async_trait::async_trait;
use std::sync::Arc;

use crate::{aggregate::BatchWrites, error::Result};

/// Durable state of the sync engine.
///
/// A single ingestion worker holds the store, so implementations need no
/// locking beyond what their own transaction primitive provides.
#[async_trait]
pub trait Store: Send + Sync {
    /// Highest height whose effects are committed, `None` before the first batch.
    async fn load_watermark(&self) -> Result<Option<u64>>;

    /// Apply all of `writes` in one transaction: counter increments, stored
    /// blocks, and the watermark update.
    ///
    /// Must fail with [`Error::OutOfOrder`](crate::Error::OutOfOrder) and write
    /// nothing if `writes.start` is not the durable watermark + 1 (0 if none).
    async fn commit_batch(&self, writes: BatchWrites) -> Result<()>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn load_watermark(&self) -> Result<Option<u64>> {
        (**self).load_watermark().await
    }

    async fn commit_batch(&self, writes: BatchWrites) -> Result<()> {
        (**self).commit_batch(writes).await
    }
}

// submodules / concrete stores live here
#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;
#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteStore;
