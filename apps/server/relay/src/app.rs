//! Process wiring: bridge, session, dispatchers, HTTP server.

use crate::error::RelayError;

use relay_core::api::{ApiState, UploadStore, start_http_server};
use relay_core::bridge::BridgeBackend;
use relay_core::bridge::launcher::launch;
use relay_core::config::RelayConfig;
use relay_core::dispatch::Dispatcher;
use relay_core::session::SessionManager;

use std::sync::Arc;

use log::{info, warn};

/// Run the relay until Ctrl+C.
///
/// The WhatsApp session is not started here; clients call `/initialize`
/// (or poll `/state`) to bring it up.
pub async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let backend = BridgeBackend::new(&config.bridge)?;
    let bridge_process = launch(&config.bridge, &backend).await?;

    let session = SessionManager::new(Arc::new(backend), config.auth_store());
    let dispatcher = Dispatcher::new(session.clone(), config.normalizer());
    let uploads = UploadStore::new(&config.server.upload_dir, config.server.retain_uploads);
    let state = ApiState::new(session.clone(), dispatcher, uploads);

    let server = start_http_server(
        config.socket_addr(),
        state,
        config.server.max_upload_bytes,
    )
    .await?;

    shutdown_signal().await;
    info!("Shutdown requested");

    server.shutdown().await;

    if let Err(e) = session.shutdown().await {
        warn!("Failed to shut down WhatsApp session: {e}");
    }

    if let Some(process) = bridge_process {
        process.stop().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C, shutting down: {e}");
    }
}
