use std::sync::Arc;

use tokio::sync::mpsc;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::chord::node::ChordNode;
use crate::chord::types::InitOutcome;
use crate::error::ChordError;
use crate::network::messages::chord::chord_server::Chord;
use crate::network::messages::chord::{
    ClosestPrecedingFingerRequest, ClosestPrecedingFingerResponse, FindSuccessorRequest,
    FindSuccessorResponse, FingerEntry, GetFingerTableRequest, GetFingerTableResponse,
    GetPredecessorRequest, GetPredecessorResponse, GetSuccessorRequest, GetSuccessorResponse,
    InitAloneRequest, InitRequest, InitResponse, LookupRequest, LookupResponse, ShutdownRequest,
    ShutdownResponse, SetPredecessorRequest, SetPredecessorResponse, UpdateFingerTableRequest,
    UpdateFingerTableResponse,
};

/// gRPC face of one node: validates every wire parameter, hands the call to
/// the protocol core, and maps core errors onto status codes. No state of
/// its own beyond the shutdown signal.
pub struct ChordGrpcService {
    node: Arc<ChordNode>,
    shutdown: mpsc::Sender<()>,
}

impl ChordGrpcService {
    pub fn new(node: Arc<ChordNode>, shutdown: mpsc::Sender<()>) -> Self {
        Self { node, shutdown }
    }
}

/// Validation failures are the caller's fault; everything else tells the
/// caller whether a retry can help.
fn to_status(err: ChordError) -> Status {
    match &err {
        ChordError::IdentifierOutOfRange { .. }
        | ChordError::IndexOutOfRange { .. }
        | ChordError::InvalidBitWidth { .. }
        | ChordError::Config(_) => Status::invalid_argument(err.to_string()),
        ChordError::NotInitialized { .. } => Status::failed_precondition(err.to_string()),
        ChordError::RoutingDiverged { .. } => Status::aborted(err.to_string()),
        ChordError::Remote(_) => Status::unavailable(err.to_string()),
        ChordError::Server(_) => Status::internal(err.to_string()),
    }
}

impl From<InitOutcome> for InitResponse {
    fn from(outcome: InitOutcome) -> Self {
        InitResponse {
            already_initialized: outcome == InitOutcome::AlreadyInitialized,
        }
    }
}

#[tonic::async_trait]
impl Chord for ChordGrpcService {
    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<FindSuccessorResponse>, Status> {
        let target = self
            .node
            .ring()
            .check(request.into_inner().target)
            .map_err(to_status)?;
        let successor = self.node.find_successor(target).await.map_err(to_status)?;
        Ok(Response::new(FindSuccessorResponse { successor }))
    }

    async fn closest_preceding_finger(
        &self,
        request: Request<ClosestPrecedingFingerRequest>,
    ) -> Result<Response<ClosestPrecedingFingerResponse>, Status> {
        let target = self
            .node
            .ring()
            .check(request.into_inner().target)
            .map_err(to_status)?;
        Ok(Response::new(ClosestPrecedingFingerResponse {
            finger: self.node.closest_preceding_finger(target).await,
        }))
    }

    async fn lookup(
        &self,
        request: Request<LookupRequest>,
    ) -> Result<Response<LookupResponse>, Status> {
        let key = request.into_inner().key;
        let (key_id, responsible_node) = self.node.lookup(&key).await.map_err(to_status)?;
        Ok(Response::new(LookupResponse {
            key_id,
            responsible_node,
        }))
    }

    async fn update_finger_table(
        &self,
        request: Request<UpdateFingerTableRequest>,
    ) -> Result<Response<UpdateFingerTableResponse>, Status> {
        let req = request.into_inner();
        let ring = self.node.ring();
        let candidate = ring.check(req.candidate).map_err(to_status)?;
        let index = ring.check_index(req.index).map_err(to_status)?;
        self.node
            .update_finger_table(candidate, index)
            .await
            .map_err(to_status)?;
        Ok(Response::new(UpdateFingerTableResponse {}))
    }

    async fn get_finger_table(
        &self,
        _request: Request<GetFingerTableRequest>,
    ) -> Result<Response<GetFingerTableResponse>, Status> {
        let entries = self
            .node
            .finger_table()
            .await
            .into_iter()
            .enumerate()
            .map(|(i, node)| FingerEntry {
                index: i as u32 + 1,
                node,
            })
            .collect();
        Ok(Response::new(GetFingerTableResponse { entries }))
    }

    async fn get_predecessor(
        &self,
        _request: Request<GetPredecessorRequest>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        Ok(Response::new(GetPredecessorResponse {
            predecessor: self.node.predecessor().await,
        }))
    }

    async fn set_predecessor(
        &self,
        request: Request<SetPredecessorRequest>,
    ) -> Result<Response<SetPredecessorResponse>, Status> {
        let predecessor = self
            .node
            .ring()
            .check(request.into_inner().predecessor)
            .map_err(to_status)?;
        self.node.set_predecessor(predecessor).await;
        Ok(Response::new(SetPredecessorResponse {}))
    }

    async fn get_successor(
        &self,
        _request: Request<GetSuccessorRequest>,
    ) -> Result<Response<GetSuccessorResponse>, Status> {
        let successor = self.node.successor().await.map_err(to_status)?;
        Ok(Response::new(GetSuccessorResponse { successor }))
    }

    async fn init(&self, request: Request<InitRequest>) -> Result<Response<InitResponse>, Status> {
        let contact = self
            .node
            .ring()
            .check(request.into_inner().contact)
            .map_err(to_status)?;
        let outcome = self.node.init(contact).await.map_err(to_status)?;
        if outcome == InitOutcome::AlreadyInitialized {
            warn!(node = self.node.id(), "ignoring repeated init");
        }
        Ok(Response::new(outcome.into()))
    }

    async fn init_alone(
        &self,
        _request: Request<InitAloneRequest>,
    ) -> Result<Response<InitResponse>, Status> {
        let outcome = self.node.init_alone().await;
        if outcome == InitOutcome::AlreadyInitialized {
            warn!(node = self.node.id(), "ignoring repeated init_alone");
        }
        Ok(Response::new(outcome.into()))
    }

    async fn shutdown(
        &self,
        _request: Request<ShutdownRequest>,
    ) -> Result<Response<ShutdownResponse>, Status> {
        info!(node = self.node.id(), "shutdown requested over rpc");
        self.shutdown
            .send(())
            .await
            .map_err(|_| Status::internal("shutdown channel closed"))?;
        Ok(Response::new(ShutdownResponse {}))
    }
}
