use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chord::node::ChordNode;
use crate::chord::ring::Ident;
use crate::config::NodeConfig;
use crate::error::ChordError;
use crate::network::grpc::client::GrpcTransport;
use crate::network::grpc::server::ChordGrpcService;
use crate::network::grpc::thread::GrpcThread;

const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// One node process: the protocol core wired to the gRPC transport on both
/// sides, plus lifecycle (server startup, ctrl-c, rpc-triggered shutdown).
pub struct NodeRuntime {
    node: Arc<ChordNode>,
    config: NodeConfig,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
    server_stop: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<Result<(), ChordError>>>,
}

impl NodeRuntime {
    pub fn new(id: Ident, config: NodeConfig) -> Result<Self, ChordError> {
        let ring = config.ring()?;
        ring.check(id)?;
        let transport = Arc::new(GrpcTransport::new(config.clone()));
        let node = Arc::new(ChordNode::new(
            id,
            ring,
            config.finger_update_policy,
            transport,
        )?);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Ok(NodeRuntime {
            node,
            config,
            shutdown_tx,
            shutdown_rx,
            server_stop: None,
            server_handle: None,
        })
    }

    pub fn node(&self) -> Arc<ChordNode> {
        Arc::clone(&self.node)
    }

    /// Binds the rpc server and waits until it is accepting calls.
    pub async fn start(&mut self) -> Result<(), ChordError> {
        if self.server_handle.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let bind_addr = self.config.bind_addr_of(self.node.id());
        let service = ChordGrpcService::new(self.node(), self.shutdown_tx.clone());
        let thread = GrpcThread::new(service, bind_addr.clone(), stop_rx, ready_tx);

        let handle = tokio::spawn(thread.run());
        self.server_stop = Some(stop_tx);
        self.server_handle = Some(handle);

        match tokio::time::timeout(SERVER_READY_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => {
                info!(node = self.node.id(), addr = %bind_addr, "node is serving");
                Ok(())
            }
            Ok(Err(_)) => Err(ChordError::Server(
                "rpc server exited before becoming ready".into(),
            )),
            Err(_) => Err(ChordError::Server("rpc server startup timed out".into())),
        }
    }

    /// Serves until ctrl-c or a Shutdown rpc, then stops the server and
    /// reaps its task.
    pub async fn run(mut self) -> Result<(), ChordError> {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(node = self.node.id(), "interrupt received, shutting down");
            }
            _ = self.shutdown_rx.recv() => {
                info!(node = self.node.id(), "shutting down");
            }
        }

        if let Some(stop) = self.server_stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(e) => {
                    error!(error = %e, "rpc server task panicked");
                    return Err(ChordError::Server(e.to_string()));
                }
            }
        }
        info!(node = self.node.id(), "node stopped");
        Ok(())
    }
}
