//! Mutual-TLS HTTP client for the full node RPC.
use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity};
use std::{fs, path::Path, time::Duration};
use tracing::debug;

use crate::{
    error::{Error, Result},
    record::{BlockRecord, GetBlockRecordsResponse},
    source::BlockSource,
};

/// PEM files that authenticate us to the node.
#[derive(Debug, Clone)]
pub struct TlsFiles<'a> {
    /// Client certificate (`private_full_node.crt`).
    pub cert: &'a Path,
    /// Client private key (`private_full_node.key`).
    pub key: &'a Path,
    /// Private CA certificate (`private_ca.crt`).
    pub ca: &'a Path,
}

/// Full node RPC client.
///
/// The node presents a certificate signed by the private CA but not issued for
/// its host name, so the chain is verified against the CA and the host name is not.
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    base_url: String,
}

impl RpcClient {
    /// Build a client for `https://{host}:{port}`.
    ///
    /// # Errors
    /// [`Error::Startup`] if a PEM file is unreadable or invalid, or the TLS
    /// stack rejects the configuration.
    pub fn new(tls: &TlsFiles<'_>, host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let mut identity_pem = read_pem(tls.cert)?;
        identity_pem.push(b'\n');
        identity_pem.extend(read_pem(tls.key)?);
        let identity = Identity::from_pem(&identity_pem)
            .map_err(|e| Error::Startup(format!("failed to load client certs: {}", e)))?;

        let ca = Certificate::from_pem(&read_pem(tls.ca)?)
            .map_err(|e| Error::Startup(format!("failed to load ca file: {}", e)))?;

        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .danger_accept_invalid_hostnames(true)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Startup(format!("failed to build rpc client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("https://{}:{}", host, port),
        })
    }

    /// POST to `get_block_records` for heights `start..end`.
    pub async fn get_block_records(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>> {
        let url = format!("{}/get_block_records", self.base_url);
        debug!(start, end, "reading blocks");

        let reply: GetBlockRecordsResponse = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "start": start, "end": end }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        reply.into_records(start, end)
    }
}

#[async_trait]
impl BlockSource for RpcClient {
    async fn fetch_block_records(&self, start: u64, end: u64) -> Result<Vec<BlockRecord>> {
        self.get_block_records(start, end).await
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Startup(format!("read {}: {}", path.display(), e)))
}
