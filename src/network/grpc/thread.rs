use futures::FutureExt;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{error, info};

use crate::error::ChordError;
use crate::network::grpc::server::ChordGrpcService;
use crate::network::messages::chord::chord_server::ChordServer;

/// Owns the tonic server for one node's lifetime: binds, signals readiness,
/// serves until the shutdown receiver fires.
pub struct GrpcThread {
    service: ChordGrpcService,
    bind_addr: String,
    shutdown_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<()>,
}

impl GrpcThread {
    pub fn new(
        service: ChordGrpcService,
        bind_addr: String,
        shutdown_rx: oneshot::Receiver<()>,
        ready_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            service,
            bind_addr,
            shutdown_rx,
            ready_tx,
        }
    }

    pub async fn run(self) -> Result<(), ChordError> {
        let addr = self.bind_addr.parse().map_err(|e| {
            ChordError::Server(format!("invalid bind address {}: {e}", self.bind_addr))
        })?;

        info!(%addr, "rpc server listening");

        let server = Server::builder()
            .tcp_nodelay(true)
            .add_service(ChordServer::new(self.service));

        let _ = self.ready_tx.send(());

        match server
            .serve_with_shutdown(addr, self.shutdown_rx.map(|_| ()))
            .await
        {
            Ok(()) => {
                info!(%addr, "rpc server stopped");
                Ok(())
            }
            Err(e) => {
                error!(%addr, error = %e, "rpc server failed");
                Err(ChordError::Server(e.to_string()))
            }
        }
    }
}
