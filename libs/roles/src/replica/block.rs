//! Blocks and their content-addressed identities.
use std::fmt;

use sha2::{Digest as _, Sha256};

use super::{QuorumCert, ReplicaId, ViewNumber};

/// An opaque command carried by a block. The consensus algorithm does not
/// interpret commands; producing them and applying them to the state machine
/// belong to the application.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Command(pub Vec<u8>);

impl Command {
    /// Returns the length of the command, in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the command is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Command")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Content-addressed identity of a block. Two blocks with the same hash are
/// the same block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl fmt::Debug for BlockHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "block:sha256:{}", hex::encode(self.0))
    }
}

/// An immutable node of the block chain. A block carries the quorum
/// certificate of an ancestor (its justification), which is `None` only for
/// the genesis block and for locally-created dummy blocks that keep view
/// numbers continuous over skipped views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Hash of the parent block.
    pub parent_hash: BlockHash,
    /// The quorum certificate this block carries.
    pub justification: Option<QuorumCert>,
    /// The view this block was proposed in.
    pub view: ViewNumber,
    /// The replica that proposed this block.
    pub proposer: ReplicaId,
    /// The command to be executed once the block is decided.
    pub command: Command,
}

impl Block {
    /// The well-known genesis block: view 0, no justification, empty command,
    /// all-zero parent hash.
    pub fn genesis() -> Self {
        Self {
            parent_hash: BlockHash([0; 32]),
            justification: None,
            view: ViewNumber(0),
            proposer: ReplicaId(0),
            command: Command::default(),
        }
    }

    /// Whether this is a dummy block (or genesis): such blocks carry no
    /// justification and are never executed.
    pub fn is_dummy(&self) -> bool {
        self.justification.is_none()
    }

    /// Computes the hash of the block over a canonical encoding of its
    /// fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update(self.parent_hash.0);
        hasher.update(self.view.0.to_be_bytes());
        hasher.update(self.proposer.0.to_be_bytes());
        match &self.justification {
            None => hasher.update([0]),
            Some(qc) => {
                hasher.update([1]);
                hasher.update(qc.block_hash.0);
                hasher.update(qc.view.0.to_be_bytes());
                hasher.update((qc.signers.len() as u64).to_be_bytes());
                for signer in &qc.signers {
                    hasher.update(signer.0.to_be_bytes());
                }
                hasher.update((qc.signature.0.len() as u64).to_be_bytes());
                hasher.update(&qc.signature.0);
            }
        }
        hasher.update((self.command.0.len() as u64).to_be_bytes());
        hasher.update(&self.command.0);
        BlockHash(hasher.finalize().into())
    }
}
