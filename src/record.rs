//! Block records as returned by the full node's `get_block_records` endpoint.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One block record fetched from the node.
///
/// Only `height`, the two puzzle hashes and `timestamp` drive aggregation; the
/// remaining fields are carried through to storage untouched. Non-transaction
/// blocks report `timestamp` (and `fees`) as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRecord {
    /// Block height.
    pub height: u64,
    /// Header hash, hex.
    pub header_hash: String,
    /// Previous header hash, hex.
    pub prev_hash: String,
    /// Puzzle hash of the farmer reward, hex (`0x`-prefixed).
    pub farmer_puzzle_hash: String,
    /// Puzzle hash of the pool reward, hex (`0x`-prefixed).
    pub pool_puzzle_hash: String,
    /// Unix timestamp; unset for non-transaction blocks.
    pub timestamp: Option<u64>,
    /// Fees collected, transaction blocks only.
    pub fees: Option<u64>,
    /// Deficit.
    pub deficit: u64,
    /// Overflow block flag.
    pub overflow: bool,
    /// Challenge block info hash, hex.
    pub challenge_block_info_hash: String,
    /// Hash of the previous transaction block, hex.
    pub prev_transaction_block_hash: Option<String>,
    /// Height of the previous transaction block.
    pub prev_transaction_block_height: u64,
    /// Required iterations.
    pub required_iters: u64,
    /// Reward infusion new challenge, hex.
    pub reward_infusion_new_challenge: String,
    /// Signage point index.
    pub signage_point_index: u64,
    /// Sub-slot iterations.
    pub sub_slot_iters: u64,
    /// Total iterations since genesis.
    pub total_iters: u128,
    /// Chain weight.
    pub weight: u128,
}

impl BlockRecord {
    /// Reported timestamp, with `0` treated as unset.
    pub fn reported_timestamp(&self) -> Option<u64> {
        self.timestamp.filter(|&t| t != 0)
    }

    /// Only transaction blocks carry a timestamp.
    pub fn is_transaction_block(&self) -> bool {
        self.reported_timestamp().is_some()
    }
}

/// A record enriched with resolved addresses, staged for verbatim persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlock {
    /// The record as fetched.
    pub record: BlockRecord,
    /// Address encoded from `farmer_puzzle_hash`.
    pub farmer_address: String,
    /// Address encoded from `pool_puzzle_hash`; `None` if it did not resolve.
    pub pool_address: Option<String>,
    /// Whether the fetched record carried a non-zero timestamp.
    pub is_transaction_block: bool,
}

/// Body of a `get_block_records` reply.
#[derive(Debug, Deserialize)]
pub struct GetBlockRecordsResponse {
    /// Records in ascending height order.
    #[serde(default)]
    pub block_records: Vec<BlockRecord>,
    /// Node-side success flag.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Node-side error message when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl GetBlockRecordsResponse {
    /// The records, or [`Error::Transport`] if the node flagged the call as failed.
    pub fn into_records(self, start: u64, end: u64) -> Result<Vec<BlockRecord>> {
        if !self.success {
            return Err(Error::Transport(format!(
                "get_block_records({start}, {end}) failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(self.block_records)
    }
}
