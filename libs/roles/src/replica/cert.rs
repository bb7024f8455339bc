//! Votes and quorum certificates.
use std::fmt;

use super::{BlockHash, ReplicaId, ViewNumber};

/// Opaque signature material produced by a replica's signer. The consensus
/// core never inspects it; creation and verification are delegated to the
/// crypto collaborator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(pub Vec<u8>);

impl fmt::Debug for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "sig:{}", hex::encode(&self.0))
    }
}

/// Opaque aggregated signature material of a quorum certificate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AggregateSignature(pub Vec<u8>);

impl fmt::Debug for AggregateSignature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "agg_sig:{}", hex::encode(&self.0))
    }
}

/// A single replica's signed vote for a block at a view.
/// WARNING: the signature is not guaranteed to be valid; verification is up
/// to the crypto collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialCert {
    /// The replica that produced the vote.
    pub signer: ReplicaId,
    /// Hash of the block being voted for.
    pub block_hash: BlockHash,
    /// The view the block was proposed in.
    pub view: ViewNumber,
    /// The signature over the block hash and view.
    pub signature: Signature,
}

/// Proof that a quorum of distinct replicas voted for a block at a view.
/// Verifiable independently of any chain state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumCert {
    /// Hash of the certified block.
    pub block_hash: BlockHash,
    /// The view the certified block was proposed in.
    pub view: ViewNumber,
    /// The replicas whose votes were aggregated, in ascending order.
    pub signers: Vec<ReplicaId>,
    /// The aggregated signature material.
    pub signature: AggregateSignature,
}

/// Information handed to the view synchronizer when the replica observes a
/// new quorum certificate, so that it may advance the view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncInfo {
    /// The newly formed or newly observed quorum certificate.
    pub qc: QuorumCert,
}
