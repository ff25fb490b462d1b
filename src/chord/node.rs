use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::chord::ring::{Ident, RingSpace};
use crate::chord::types::{FingerTable, FingerUpdatePolicy, InitOutcome};
use crate::chord::ROUTE_HOP_FACTOR;
use crate::error::ChordError;

/// The calls every node must answer for every other node. One implementation
/// speaks gRPC to real peers; tests provide an in-process ring so many
/// simulated nodes can run in one process.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn predecessor(&self, node: Ident) -> Result<Option<Ident>, ChordError>;
    async fn successor(&self, node: Ident) -> Result<Ident, ChordError>;
    async fn closest_preceding_finger(
        &self,
        node: Ident,
        target: Ident,
    ) -> Result<Ident, ChordError>;
    async fn find_successor(&self, node: Ident, target: Ident) -> Result<Ident, ChordError>;
    async fn update_finger_table(
        &self,
        node: Ident,
        candidate: Ident,
        index: usize,
    ) -> Result<(), ChordError>;
    async fn set_predecessor(&self, node: Ident, predecessor: Ident) -> Result<(), ChordError>;
}

/// One Chord node: an identifier plus the routing state the maintenance
/// algorithms keep converging toward the true ring.
///
/// The finger table and predecessor sit behind their own locks; every
/// critical section is a short read or write and no guard is ever held
/// across an outbound call, so a slow peer never stalls unrelated requests.
pub struct ChordNode {
    id: Ident,
    ring: RingSpace,
    policy: FingerUpdatePolicy,
    fingers: RwLock<FingerTable>,
    predecessor: RwLock<Option<Ident>>,
    initialized: AtomicBool,
    // serializes the check-then-set of `initialized` across concurrent joins
    init_lock: Mutex<()>,
    peers: Arc<dyn PeerTransport>,
}

impl ChordNode {
    pub fn new(
        id: Ident,
        ring: RingSpace,
        policy: FingerUpdatePolicy,
        peers: Arc<dyn PeerTransport>,
    ) -> Result<Self, ChordError> {
        ring.check(id)?;
        Ok(ChordNode {
            id,
            ring,
            policy,
            fingers: RwLock::new(FingerTable::new(ring.bits())),
            predecessor: RwLock::new(None),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            peers,
        })
    }

    pub fn id(&self) -> Ident {
        self.id
    }

    pub fn ring(&self) -> RingSpace {
        self.ring
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // --- local state access -------------------------------------------------

    /// The immediate ring successor, finger[1].
    pub async fn successor(&self) -> Result<Ident, ChordError> {
        self.fingers
            .read()
            .await
            .successor()
            .ok_or(ChordError::NotInitialized { node: self.id })
    }

    pub async fn predecessor(&self) -> Option<Ident> {
        *self.predecessor.read().await
    }

    pub async fn set_predecessor(&self, node: Ident) {
        debug!(node = self.id, predecessor = node, "predecessor updated");
        *self.predecessor.write().await = Some(node);
    }

    /// Diagnostics snapshot of the finger table, entry 1 first.
    pub async fn finger_table(&self) -> Vec<Option<Ident>> {
        self.fingers.read().await.entries()
    }

    /// Scans the finger table from the farthest entry down for the finger
    /// closest to, but strictly preceding, `target`. Falls back to this
    /// node's own identifier when no entry qualifies; a lookup for this
    /// node's own identifier short-circuits the same way regardless of
    /// table contents.
    pub async fn closest_preceding_finger(&self, target: Ident) -> Ident {
        if target == self.id {
            return self.id;
        }
        let fingers = self.fingers.read().await;
        for i in (1..=fingers.len()).rev() {
            if let Some(finger) = fingers.get(i) {
                if self.ring.in_range(finger, self.id, target) {
                    return finger;
                }
            }
        }
        self.id
    }

    // --- uniform self-or-remote dispatch ------------------------------------
    //
    // Every algorithm below talks to "some node" through these helpers; when
    // the node happens to be this one the local function runs in-process,
    // otherwise the call crosses the transport.

    async fn call_successor(&self, node: Ident) -> Result<Ident, ChordError> {
        if node == self.id {
            self.successor().await
        } else {
            self.peers.successor(node).await
        }
    }

    async fn call_predecessor(&self, node: Ident) -> Result<Option<Ident>, ChordError> {
        if node == self.id {
            Ok(self.predecessor().await)
        } else {
            self.peers.predecessor(node).await
        }
    }

    async fn call_closest_preceding_finger(
        &self,
        node: Ident,
        target: Ident,
    ) -> Result<Ident, ChordError> {
        if node == self.id {
            Ok(self.closest_preceding_finger(target).await)
        } else {
            self.peers.closest_preceding_finger(node, target).await
        }
    }

    async fn call_find_successor(&self, node: Ident, target: Ident) -> Result<Ident, ChordError> {
        if node == self.id {
            self.find_successor(target).await
        } else {
            self.peers.find_successor(node, target).await
        }
    }

    async fn call_update_finger_table(
        &self,
        node: Ident,
        candidate: Ident,
        index: usize,
    ) -> Result<(), ChordError> {
        if node == self.id {
            self.update_finger_table(candidate, index).await
        } else {
            self.peers.update_finger_table(node, candidate, index).await
        }
    }

    async fn call_set_predecessor(&self, node: Ident, pred: Ident) -> Result<(), ChordError> {
        if node == self.id {
            self.set_predecessor(pred).await;
            Ok(())
        } else {
            self.peers.set_predecessor(node, pred).await
        }
    }

    // --- routing ------------------------------------------------------------

    /// Walks the ring toward `target` and returns the node immediately
    /// preceding it. Each hop asks the current candidate for its closest
    /// preceding finger, so the walk advances as far as that node's table
    /// allows. The walk is capped at a small multiple of M hops; a walk
    /// that makes no progress fails instead of circling forever.
    pub async fn find_predecessor(&self, target: Ident) -> Result<Ident, ChordError> {
        let max_hops = self.ring.bits() as u32 * ROUTE_HOP_FACTOR;
        let mut curr = self.id;
        let mut hops = 0u32;
        loop {
            let succ = self.call_successor(curr).await?;
            // target ∈ (curr, succ] means curr is the predecessor; a node
            // that is its own successor is a single-node ring.
            if self
                .ring
                .in_range(target, curr, self.ring.successor_of(succ))
                || curr == succ
            {
                return Ok(curr);
            }
            hops += 1;
            if hops > max_hops {
                return Err(ChordError::RoutingDiverged { target, hops });
            }
            let next = self.call_closest_preceding_finger(curr, target).await?;
            debug!(node = self.id, target, from = curr, to = next, hops, "routing hop");
            curr = next;
        }
    }

    /// The externally visible lookup primitive: the node responsible for
    /// `target` is the successor of `target`'s predecessor.
    pub async fn find_successor(&self, target: Ident) -> Result<Ident, ChordError> {
        let pred = self.find_predecessor(target).await?;
        self.call_successor(pred).await
    }

    /// Maps an application key onto the ring and finds its owner.
    pub async fn lookup(&self, key: &str) -> Result<(Ident, Ident), ChordError> {
        let key_id = self.ring.hash_key(key);
        debug!(node = self.id, key, key_id, "key lookup");
        let owner = self.find_successor(key_id).await?;
        Ok((key_id, owner))
    }

    // --- join & maintenance -------------------------------------------------

    /// Bootstraps a brand-new ring: every finger and the predecessor point
    /// at this node itself. Idempotent; only the first call mutates state.
    pub async fn init_alone(&self) -> InitOutcome {
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return InitOutcome::AlreadyInitialized;
        }
        self.fingers.write().await.fill(self.id);
        *self.predecessor.write().await = Some(self.id);
        self.initialized.store(true, Ordering::Release);
        info!(node = self.id, "initialized as the first node of a new ring");
        InitOutcome::Initialized
    }

    /// Joins an existing ring through `contact`: populates the finger table,
    /// links into the successor/predecessor chain, then tells the nodes that
    /// should now route through this node. Idempotent like `init_alone`.
    pub async fn init(&self, contact: Ident) -> Result<InitOutcome, ChordError> {
        self.ring.check(contact)?;
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(InitOutcome::AlreadyInitialized);
        }
        info!(node = self.id, contact, "joining ring");
        self.init_finger_table(contact).await?;
        self.update_others().await?;
        self.initialized.store(true, Ordering::Release);
        info!(node = self.id, contact, "join complete");
        Ok(InitOutcome::Initialized)
    }

    /// Fills the finger table by asking `contact` to resolve successors.
    /// When the next finger's start already lies inside the span covered by
    /// the current entry the entry is copied forward instead of queried,
    /// which keeps the expected number of remote lookups sub-linear in M.
    async fn init_finger_table(&self, contact: Ident) -> Result<(), ChordError> {
        let succ = self.call_find_successor(contact, self.id).await?;
        self.fingers.write().await.set(1, succ);
        debug!(node = self.id, successor = succ, "adopted ring successor");

        let pred = self
            .call_predecessor(succ)
            .await?
            .ok_or(ChordError::NotInitialized { node: succ })?;
        *self.predecessor.write().await = Some(pred);
        self.call_set_predecessor(succ, self.id).await?;

        for i in 1..self.ring.bits() as usize {
            let next_start = self.ring.finger_start(self.id, i + 1);
            let current = self
                .fingers
                .read()
                .await
                .get(i)
                .ok_or(ChordError::NotInitialized { node: self.id })?;
            // next_start ∈ [self.id, current) — the span the current entry
            // already answers for. next_start can never equal self.id, so
            // the open interval test is exact here.
            let next = if self.ring.in_range(next_start, self.id, current) {
                current
            } else {
                self.call_find_successor(contact, next_start).await?
            };
            self.fingers.write().await.set(i + 1, next);
        }
        Ok(())
    }

    /// Informs every node whose finger table may need to reference the
    /// freshly joined node: for each table level the last node whose i-th
    /// finger span covers this identifier is found and pushed an update.
    async fn update_others(&self) -> Result<(), ChordError> {
        for i in 1..=self.ring.bits() as usize {
            let origin = self.ring.finger_origin(self.id, i);
            let p = self.find_predecessor(origin).await?;
            self.call_update_finger_table(p, self.id, i).await?;
        }
        Ok(())
    }

    /// Handles a maintenance push: adopts `candidate` as finger `index` if
    /// it lies closer than the current entry, then forwards the same update
    /// one step along the predecessor chain. The chain dies out when a node
    /// no longer adopts, when the predecessor is the node itself, or when
    /// the push reaches back around to the candidate.
    pub async fn update_finger_table(
        &self,
        candidate: Ident,
        index: usize,
    ) -> Result<(), ChordError> {
        let adopted = {
            let mut fingers = self.fingers.write().await;
            match fingers.get(index) {
                Some(current) if self.adopts(candidate, current) => {
                    fingers.set(index, candidate);
                    true
                }
                Some(_) => false,
                None => return Err(ChordError::NotInitialized { node: self.id }),
            }
        };
        if !adopted {
            return Ok(());
        }
        debug!(node = self.id, candidate, index, "finger entry updated");

        // the forward skips the self case, so it can go straight to the
        // transport without recursing through the dispatch layer
        match self.predecessor().await {
            Some(p) if p != self.id => self.peers.update_finger_table(p, candidate, index).await,
            _ => Ok(()),
        }
    }

    /// Whether `candidate` should replace `current` as finger entry. An
    /// entry equal to this node's own identifier spans the whole ring (it
    /// is 2^M away, not 0 away), so that case is decided without the
    /// general interval test.
    fn adopts(&self, candidate: Ident, current: Ident) -> bool {
        if candidate == current {
            return false;
        }
        match self.policy {
            FingerUpdatePolicy::Exclusive => {
                if current == self.id {
                    candidate != self.id
                } else {
                    self.ring.in_range(candidate, self.id, current)
                }
            }
            // the paper's interval is closed at this node's own identifier
            FingerUpdatePolicy::Paper => {
                if current == self.id {
                    true
                } else {
                    candidate == self.id || self.ring.in_range(candidate, self.id, current)
                }
            }
        }
    }
}
