//! Puzzle hash to address encoding.
use bech32::{Bech32m, Hrp};

use crate::error::{Error, Result};

/// Address prefix of Chia mainnet.
pub const MAINNET_PREFIX: &str = "xch";

/// Turns a raw puzzle hash into a human-facing address. Pure and deterministic.
pub trait AddressResolver: Send + Sync {
    /// Encode `puzzle_hash` (hex, optionally `0x`-prefixed).
    fn resolve(&self, puzzle_hash: &str) -> Result<String>;
}

/// Bech32m encoder with a fixed network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bech32mResolver {
    hrp: Hrp,
}

impl Bech32mResolver {
    /// Resolver for addresses starting with `prefix` (e.g. `xch`, `txch`).
    pub fn new(prefix: &str) -> Result<Self> {
        let hrp = Hrp::parse(prefix)
            .map_err(|e| Error::Startup(format!("invalid address prefix {prefix:?}: {e}")))?;
        Ok(Self { hrp })
    }

    /// `xch` resolver.
    pub fn mainnet() -> Self {
        Self {
            hrp: Hrp::parse_unchecked(MAINNET_PREFIX),
        }
    }
}

impl AddressResolver for Bech32mResolver {
    fn resolve(&self, puzzle_hash: &str) -> Result<String> {
        let digits = puzzle_hash.strip_prefix("0x").unwrap_or(puzzle_hash);
        let bytes = hex::decode(digits).map_err(|e| {
            Error::AddressResolution(format!("puzzle hash {puzzle_hash:?} is not hex: {e}"))
        })?;
        if bytes.len() != 32 {
            return Err(Error::AddressResolution(format!(
                "puzzle hash {puzzle_hash:?} is {} bytes, expected 32",
                bytes.len()
            )));
        }
        bech32::encode::<Bech32m>(self.hrp, &bytes)
            .map_err(|e| Error::AddressResolution(format!("encode {puzzle_hash:?}: {e}")))
    }
}
