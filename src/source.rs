//! Abstraction for fetching block records from a node (HTTP RPC or anything else).
use async_trait::async_trait;
use std::sync::Arc;

use crate::{error::Result, record::BlockRecord};

/// Network provider of block records.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the records for heights `start..end`, in ascending order.
    ///
    /// Near the chain head the node returns fewer records than requested (possibly
    /// none); that is not an error. Failures to talk to the node are
    /// [`Error::Transport`](crate::Error::Transport).
    async fn fetch_block_records(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>>;
}

#[async_trait]
impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    async fn fetch_block_records(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>> {
        (**self).fetch_block_records(start, end).await
    }
}
