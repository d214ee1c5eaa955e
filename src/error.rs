//! Error taxonomy for the sync engine.

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while fetching, aggregating, or persisting a batch.
///
/// Only [`Error::Startup`] is fatal. Every other variant leaves the store exactly
/// as it was before the failed operation, so the same height range can be retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or RPC failure while fetching block records.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A puzzle hash could not be encoded as an address.
    #[error("Address resolution error: {0}")]
    AddressResolution(String),

    /// The durable store failed during a read or the atomic batch commit.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A batch does not continue the watermark.
    #[error("Batch out of order: expected height {expected}, got {got}")]
    OutOfOrder {
        /// Height the next record had to carry.
        expected: u64,
        /// Height actually found.
        got: u64,
    },

    /// Aggregation was asked to apply a batch without records.
    #[error("Empty batch")]
    EmptyBatch,

    /// A timestamp that does not map to a calendar day.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(u64),

    /// The RPC transport (or another collaborator) could not be constructed.
    #[error("Startup error: {0}")]
    Startup(String),
}

impl Error {
    /// `true` when the sync loop must not be started at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Startup(_))
    }
}

#[cfg(feature = "store-sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

#[cfg(feature = "rpc")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Persistence(format!("blocking task failed: {}", e))
    }
}
