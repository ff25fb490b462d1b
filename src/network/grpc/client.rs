use std::future::Future;

use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::debug;

use crate::chord::node::PeerTransport;
use crate::chord::ring::Ident;
use crate::config::NodeConfig;
use crate::error::{ChordError, RemoteError};
use crate::network::messages::chord::chord_client::ChordClient;
use crate::network::messages::chord::{
    ClosestPrecedingFingerRequest, FindSuccessorRequest, GetPredecessorRequest,
    GetSuccessorRequest, SetPredecessorRequest, UpdateFingerTableRequest,
};

/// The networked half of the remote-access seam: marshals each ring
/// operation to the node owning the target identifier, resolving addresses
/// through the deployment convention in `NodeConfig`.
///
/// Connections are dialed per call and every call is bounded by the
/// configured timeout, so one unresponsive peer cannot wedge a routing walk
/// for longer than that bound.
pub struct GrpcTransport {
    config: NodeConfig,
}

impl GrpcTransport {
    pub fn new(config: NodeConfig) -> Self {
        GrpcTransport { config }
    }

    async fn connect(&self, node: Ident) -> Result<ChordClient<Channel>, ChordError> {
        let url = self.config.url_of(node);
        debug!(peer = node, url = %url, "dialing peer");
        match tokio::time::timeout(self.config.rpc_timeout(), ChordClient::connect(url)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e)) => Err(RemoteError::Unreachable {
                node,
                reason: e.to_string(),
            }
            .into()),
            Err(_) => Err(RemoteError::Timeout {
                node,
                timeout: self.config.rpc_timeout(),
            }
            .into()),
        }
    }

    async fn bounded<T, F>(&self, node: Ident, call: F) -> Result<T, ChordError>
    where
        F: Future<Output = Result<tonic::Response<T>, Status>>,
    {
        match tokio::time::timeout(self.config.rpc_timeout(), call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(map_status(node, status).into()),
            Err(_) => Err(RemoteError::Timeout {
                node,
                timeout: self.config.rpc_timeout(),
            }
            .into()),
        }
    }
}

/// A transport-level failure means the peer never answered; an application
/// status means it answered and refused.
fn map_status(node: Ident, status: Status) -> RemoteError {
    match status.code() {
        Code::Unavailable | Code::Unknown => RemoteError::Unreachable {
            node,
            reason: status.to_string(),
        },
        _ => RemoteError::Rejected {
            node,
            status: format!("{:?}: {}", status.code(), status.message()),
        },
    }
}

#[async_trait]
impl PeerTransport for GrpcTransport {
    async fn predecessor(&self, node: Ident) -> Result<Option<Ident>, ChordError> {
        let mut client = self.connect(node).await?;
        let response = self
            .bounded(node, client.get_predecessor(GetPredecessorRequest {}))
            .await?;
        Ok(response.predecessor)
    }

    async fn successor(&self, node: Ident) -> Result<Ident, ChordError> {
        let mut client = self.connect(node).await?;
        let response = self
            .bounded(node, client.get_successor(GetSuccessorRequest {}))
            .await?;
        Ok(response.successor)
    }

    async fn closest_preceding_finger(
        &self,
        node: Ident,
        target: Ident,
    ) -> Result<Ident, ChordError> {
        let mut client = self.connect(node).await?;
        let response = self
            .bounded(
                node,
                client.closest_preceding_finger(ClosestPrecedingFingerRequest { target }),
            )
            .await?;
        Ok(response.finger)
    }

    async fn find_successor(&self, node: Ident, target: Ident) -> Result<Ident, ChordError> {
        let mut client = self.connect(node).await?;
        let response = self
            .bounded(node, client.find_successor(FindSuccessorRequest { target }))
            .await?;
        Ok(response.successor)
    }

    async fn update_finger_table(
        &self,
        node: Ident,
        candidate: Ident,
        index: usize,
    ) -> Result<(), ChordError> {
        let mut client = self.connect(node).await?;
        self.bounded(
            node,
            client.update_finger_table(UpdateFingerTableRequest {
                candidate,
                index: index as u32,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_predecessor(&self, node: Ident, predecessor: Ident) -> Result<(), ChordError> {
        let mut client = self.connect(node).await?;
        self.bounded(
            node,
            client.set_predecessor(SetPredecessorRequest { predecessor }),
        )
        .await?;
        Ok(())
    }
}
