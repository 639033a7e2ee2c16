use std::net::SocketAddr;

use log::{info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to the running HTTP server.
///
/// Returned by [`start_http_server`](crate::api::start_http_server). Dropping
/// the handle leaves the server running until the process exits; call
/// [`shutdown`](Self::shutdown) to stop accepting and drain in-flight requests.
#[derive(Debug)]
pub struct RelayServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        shutdown_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            shutdown_tx,
            task,
        }
    }

    /// The bound address; differs from the requested one when port 0 was used.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the server gracefully and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());

        match self.task.await {
            Ok(()) => info!("HTTP server on {} stopped", self.local_addr),
            Err(e) => warn!("HTTP server task on {} failed: {e}", self.local_addr),
        }
    }
}
