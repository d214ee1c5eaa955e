#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! chia-block-sync: a resumable block ingestion engine that counts blocks per farmer.
//!
//! ## What you implement (or take from this crate)
//! - [`BlockSource`]: fetch block records for a height range ([`RpcClient`] talks to a full node).
//! - [`AddressResolver`]: turn puzzle hashes into addresses ([`Bech32mResolver`]).
//! - [`HeightTimeEstimator`]: guess a block's time from its height ([`LinearEstimator`]).
//! - [`Store`]: a watermark plus farmer counters, committed atomically ([`SqliteStore`]).
//!
//! ## What the engine does
//! - Resumes from the durable watermark (last committed height + 1).
//! - Pulls fixed-size batches; a short batch means it reached the chain head.
//! - Counts blocks per farmer, overall and per UTC day, optionally storing the
//!   records, and advances the watermark in the **same** transaction. A crash
//!   can never double count or skip a height.
//! - Re-fetches immediately while behind, waits the poll interval once caught up
//!   or after any error, and stops between steps when cancelled.
//!
//! ## Minimal usage
//! ```rust,ignore
//! use chia_block_sync::prelude::*;
//! use std::path::Path;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let tls = TlsFiles {
//!         cert: Path::new("private_full_node.crt"),
//!         key: Path::new("private_full_node.key"),
//!         ca: Path::new("private_ca.crt"),
//!     };
//!     let source = RpcClient::new(&tls, "localhost", 8555, std::time::Duration::from_secs(5))?;
//!     let store = SqliteStore::new("blocks.sqlite")?;
//!     let aggregator = Aggregator::new(
//!         store,
//!         Bech32mResolver::mainnet(),
//!         LinearEstimator::default(),
//!         SystemClock,
//!     );
//!     let mut engine = SyncEngine::new(source, aggregator, SyncConfig::default());
//!
//!     let cancel = CancelToken::new();
//!     engine.run(&cancel).await;
//!     Ok(())
//! }
//! ```
/// Puzzle hash to address encoding.
pub mod address;

/// Planning and committing one batch: counters, stored blocks, watermark.
pub mod aggregate;

/// Cooperative cancellation for the sync task.
pub mod cancel;

/// JSON settings file.
pub mod config;

/// The resumable sync loop.
pub mod engine;

/// Error taxonomy.
pub mod error;

/// Block record types.
pub mod record;

/// Block record sources.
pub mod source;

/// Effective timestamps and UTC days.
pub mod timestamp;

/// Full node RPC over mutual TLS.
#[cfg(feature = "rpc")]
pub mod rpc;

/// Process wiring: build the engine from settings and run it on a task.
#[cfg(feature = "rpc")]
pub mod daemon;

/// Persistence layer (traits and SQLite implementation).
pub mod store;

// Public re-exports
pub use address::{AddressResolver, Bech32mResolver};
pub use aggregate::{Aggregator, BatchWrites};
pub use cancel::CancelToken;
pub use engine::{SyncConfig, SyncEngine, SyncState};
pub use error::{Error, Result};
pub use record::{BlockRecord, StoredBlock};
pub use source::BlockSource;
pub use store::Store;
pub use timestamp::{Clock, HeightTimeEstimator, LinearEstimator, SystemClock};

#[cfg(feature = "rpc")]
pub use rpc::{RpcClient, TlsFiles};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;

/// Convenience prelude for end users.
pub mod prelude {
    pub use crate::{
        AddressResolver, Aggregator, Bech32mResolver, BlockRecord, BlockSource, CancelToken,
        Clock, HeightTimeEstimator, LinearEstimator, Store, SyncConfig, SyncEngine, SyncState,
        SystemClock,
    };

    #[cfg(feature = "rpc")]
    pub use crate::{RpcClient, TlsFiles};
    #[cfg(feature = "store-sqlite")]
    pub use crate::SqliteStore;
}
