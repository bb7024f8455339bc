//! Configuration of the consensus component: the replica's identity, the
//! committee, and the external collaborators it drives.
use std::sync::Arc;

use hotstuff_roles::replica;
use hotstuff_storage::BlockStore;

use crate::{Acceptor, CommandQueue, Executor, LeaderRotation, Signer, Verifier};

/// Configuration of the consensus component.
#[derive(Debug)]
pub struct Config {
    /// Identity of this replica.
    pub replica_id: replica::ReplicaId,
    /// The committee this replica participates in.
    pub committee: replica::Committee,
    /// Block store. Shared with the network layer, which inserts fetched
    /// blocks through `InputMessage::Block` rather than writing directly.
    pub block_store: Arc<BlockStore>,
    /// Signs votes and aggregates them into quorum certificates.
    pub signer: Arc<dyn Signer>,
    /// Verifies partial and quorum certificates.
    pub verifier: Arc<dyn Verifier>,
    /// Supplies commands to propose.
    pub command_queue: Box<dyn CommandQueue>,
    /// Admission filter for proposed commands.
    pub acceptor: Box<dyn Acceptor>,
    /// Applies decided commands.
    pub executor: Box<dyn Executor>,
    /// Leader rotation policy.
    pub leader_rotation: Box<dyn LeaderRotation>,
}

impl Config {
    /// Number of votes required to form a quorum certificate.
    pub fn quorum_size(&self) -> usize {
        self.committee.quorum_size()
    }
}
