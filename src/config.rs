//! JSON configuration file.
use anyhow::{bail, Context};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    address::MAINNET_PREFIX,
    engine::{SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL},
    timestamp::{LinearEstimator, MAINNET_BLOCK_INTERVAL_MS, MAINNET_GENESIS_TIMESTAMP},
};

/// Name of the file looked up in the default locations.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Full node host.
    pub rpc_host: String,
    /// Full node RPC port.
    pub full_node_rpc_port: u16,
    /// Client certificate, PEM.
    pub private_cert: PathBuf,
    /// Client key, PEM.
    pub private_key: PathBuf,
    /// Private CA certificate, PEM.
    pub ca_cert: PathBuf,
    /// Persist every block record, not just the counters.
    #[serde(default)]
    pub sync_blocks: bool,
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Blocks per fetch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Seconds to wait when caught up or after an error.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// RPC request timeout in seconds.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    /// Address prefix (`xch`, `txch`).
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
    /// Unix time of height 0 for the height to time estimate.
    #[serde(default = "default_genesis_timestamp")]
    pub genesis_timestamp: u64,
    /// Expected milliseconds between blocks for the height to time estimate.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("chia-block-sync.sqlite")
}
fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}
fn default_rpc_timeout_secs() -> u64 {
    5
}
fn default_address_prefix() -> String {
    MAINNET_PREFIX.to_string()
}
fn default_genesis_timestamp() -> u64 {
    MAINNET_GENESIS_TIMESTAMP
}
fn default_block_interval_ms() -> u64 {
    MAINNET_BLOCK_INTERVAL_MS
}

impl Settings {
    /// Load from `path`, or from the first `config.json` found in
    /// `/etc/chia-block-sync/`, `$HOME/.chia-block-sync/`, and the working directory.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_locations()
                .into_iter()
                .find(|p| p.is_file())
                .context("config file not found")?,
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("load config {}", path.display()))
    }

    /// Parse and validate a JSON document. A leading `~` in a path means the home directory.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let mut settings: Settings = serde_json::from_str(raw).context("parse config")?;
        settings.validate()?;
        for path in [
            &mut settings.private_cert,
            &mut settings.private_key,
            &mut settings.ca_cert,
            &mut settings.db_path,
        ] {
            *path = expand_home(path);
        }
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_host.is_empty() {
            bail!("error config: rpc_host can not be empty");
        }
        if self.full_node_rpc_port == 0 {
            bail!("error config: full_node_rpc_port can not be empty");
        }
        for (key, path) in [
            ("private_cert", &self.private_cert),
            ("private_key", &self.private_key),
            ("ca_cert", &self.ca_cert),
        ] {
            if path.as_os_str().is_empty() {
                bail!("error config: {key} can not be empty");
            }
        }
        if self.db_path.as_os_str().is_empty() {
            bail!("error config: db_path can not be empty");
        }
        if self.batch_size == 0 {
            bail!("error config: batch_size must be positive");
        }
        if self.block_interval_ms == 0 {
            bail!("error config: block_interval_ms must be positive");
        }
        Ok(())
    }

    /// Loop settings.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.batch_size,
            interval: Duration::from_secs(self.interval_secs),
            sync_blocks: self.sync_blocks,
        }
    }

    /// Height to time estimate.
    pub fn estimator(&self) -> LinearEstimator {
        LinearEstimator {
            genesis_timestamp: self.genesis_timestamp,
            block_interval_ms: self.block_interval_ms,
        }
    }

    /// RPC request timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// Replace a leading `~` with the home directory; other paths are returned as is.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/etc/chia-block-sync")];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".chia-block-sync"));
    }
    roots.push(PathBuf::from("."));
    roots
        .into_iter()
        .map(|root| root.join(CONFIG_FILE_NAME))
        .collect()
}
