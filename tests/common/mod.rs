use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use chordial::chord::node::{ChordNode, PeerTransport};
use chordial::chord::ring::{Ident, RingSpace};
use chordial::chord::types::FingerUpdatePolicy;
use chordial::error::{ChordError, RemoteError};

/// In-process stand-in for the network: every simulated node registers here
/// and calls between them dispatch directly, so whole rings can be built and
/// exercised inside one test.
#[derive(Default)]
pub struct SimNetwork {
    nodes: RwLock<HashMap<Ident, Arc<ChordNode>>>,
}

impl SimNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(SimNetwork::default())
    }

    pub fn spawn(
        net: &Arc<Self>,
        id: Ident,
        ring: RingSpace,
        policy: FingerUpdatePolicy,
    ) -> Arc<ChordNode> {
        let transport = Arc::clone(net) as Arc<dyn PeerTransport>;
        let node = Arc::new(ChordNode::new(id, ring, policy, transport).unwrap());
        net.nodes.write().unwrap().insert(id, Arc::clone(&node));
        node
    }

    /// Simulates a peer dropping off the network.
    pub fn disconnect(&self, id: Ident) {
        self.nodes.write().unwrap().remove(&id);
    }

    fn get(&self, node: Ident) -> Result<Arc<ChordNode>, ChordError> {
        self.nodes
            .read()
            .unwrap()
            .get(&node)
            .cloned()
            .ok_or_else(|| {
                RemoteError::Unreachable {
                    node,
                    reason: "connection refused".into(),
                }
                .into()
            })
    }
}

#[async_trait]
impl PeerTransport for SimNetwork {
    async fn predecessor(&self, node: Ident) -> Result<Option<Ident>, ChordError> {
        Ok(self.get(node)?.predecessor().await)
    }

    async fn successor(&self, node: Ident) -> Result<Ident, ChordError> {
        self.get(node)?.successor().await
    }

    async fn closest_preceding_finger(
        &self,
        node: Ident,
        target: Ident,
    ) -> Result<Ident, ChordError> {
        Ok(self.get(node)?.closest_preceding_finger(target).await)
    }

    async fn find_successor(&self, node: Ident, target: Ident) -> Result<Ident, ChordError> {
        self.get(node)?.find_successor(target).await
    }

    async fn update_finger_table(
        &self,
        node: Ident,
        candidate: Ident,
        index: usize,
    ) -> Result<(), ChordError> {
        self.get(node)?.update_finger_table(candidate, index).await
    }

    async fn set_predecessor(&self, node: Ident, predecessor: Ident) -> Result<(), ChordError> {
        self.get(node)?.set_predecessor(predecessor).await;
        Ok(())
    }
}
