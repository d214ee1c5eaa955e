//! Wires settings, the RPC transport and a store into a running sync task.
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{error, info};

use crate::{
    address::Bech32mResolver,
    aggregate::Aggregator,
    cancel::CancelToken,
    config::Settings,
    engine::SyncEngine,
    error::Result,
    rpc::{RpcClient, TlsFiles},
    store::Store,
    timestamp::{LinearEstimator, SystemClock},
};

/// Engine as the daemon runs it.
pub type DaemonEngine<S> = SyncEngine<RpcClient, S, Bech32mResolver, LinearEstimator, SystemClock>;

/// Build the production engine for `settings`.
///
/// # Errors
/// [`Error::Startup`](crate::Error::Startup) if the TLS material or the address
/// prefix is unusable.
pub fn build_engine<S: Store>(settings: &Settings, store: S) -> Result<DaemonEngine<S>> {
    let tls = TlsFiles {
        cert: &settings.private_cert,
        key: &settings.private_key,
        ca: &settings.ca_cert,
    };
    let source = RpcClient::new(
        &tls,
        &settings.rpc_host,
        settings.full_node_rpc_port,
        settings.rpc_timeout(),
    )?;
    let addresses = Bech32mResolver::new(&settings.address_prefix)?;
    let aggregator = Aggregator::new(store, addresses, settings.estimator(), SystemClock);
    Ok(SyncEngine::new(source, aggregator, settings.sync_config()))
}

/// Start the sync loop on its own task.
///
/// The receiver yields the error if the engine cannot be built; the loop never
/// starts in that case. Otherwise the task runs until `cancel` fires, and the
/// receiver only resolves (with a closed-channel error) once the task is done.
pub fn spawn<S: Store + 'static>(
    settings: &Settings,
    store: S,
    cancel: CancelToken,
) -> (JoinHandle<()>, oneshot::Receiver<crate::Error>) {
    let (startup_tx, startup_rx) = oneshot::channel();
    let settings = settings.clone();

    let handle = tokio::spawn(async move {
        let mut engine = match build_engine(&settings, store) {
            Ok(engine) => engine,
            Err(e) => {
                error!("error create rpc client: {}", e);
                let _ = startup_tx.send(e);
                return;
            }
        };
        info!(
            host = %settings.rpc_host,
            port = settings.full_node_rpc_port,
            sync_blocks = settings.sync_blocks,
            "sync started"
        );
        engine.run(&cancel).await;
        drop(startup_tx);
    });

    (handle, startup_rx)
}
