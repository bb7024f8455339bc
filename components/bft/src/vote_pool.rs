//! Buffers partial certificates until a quorum forms. Votes whose block has
//! not arrived yet are parked separately and released on delivery. At most
//! one vote per `(signer, block hash)` pair is ever counted.
use std::{collections::HashMap, sync::Arc};

use hotstuff_roles::replica;
use hotstuff_storage::BlockStore;
use zksync_concurrency::ctx;

use crate::Signer;

/// Pool of votes, keyed by the hash of the block they are for.
#[derive(Debug)]
pub(crate) struct VotePool {
    /// Number of votes required to form a quorum certificate.
    quorum_size: usize,
    /// Aggregates a quorum of votes into a certificate.
    signer: Arc<dyn Signer>,
    /// Verified votes that could become a QC.
    verified: HashMap<replica::BlockHash, Vec<replica::PartialCert>>,
    /// Votes received before their block was available locally.
    pending: HashMap<replica::BlockHash, Vec<replica::PartialCert>>,
}

impl VotePool {
    pub(crate) fn new(quorum_size: usize, signer: Arc<dyn Signer>) -> Self {
        Self {
            quorum_size,
            signer,
            verified: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Whether a verified vote from the same signer for the same block was
    /// already recorded.
    pub(crate) fn is_duplicate(&self, cert: &replica::PartialCert) -> bool {
        self.verified
            .get(&cert.block_hash)
            .is_some_and(|votes| votes.iter().any(|vote| vote.signer == cert.signer))
    }

    /// Records a verified vote. When the vote completes a quorum, the votes
    /// are aggregated into a quorum certificate and their entry is removed
    /// from the pool. Duplicate votes are silently discarded.
    pub(crate) async fn record_verified(
        &mut self,
        ctx: &ctx::Ctx,
        block: &replica::Block,
        cert: replica::PartialCert,
    ) -> ctx::Result<Option<replica::QuorumCert>> {
        let hash = cert.block_hash;
        let votes = self.verified.entry(hash).or_default();
        if !votes.iter().any(|vote| vote.signer == cert.signer) {
            votes.push(cert);
        }
        if votes.len() < self.quorum_size {
            return Ok(None);
        }
        let votes = self.verified.remove(&hash).unwrap_or_default();
        let qc = self.signer.create_quorum_cert(ctx, block, &votes).await?;
        Ok(Some(qc))
    }

    /// Parks a vote whose block has not arrived yet. Returns whether this is
    /// the first vote parked for that block, which is what triggers a fetch.
    pub(crate) fn park(&mut self, cert: replica::PartialCert) -> bool {
        let votes = self.pending.entry(cert.block_hash).or_default();
        let first = votes.is_empty();
        if !votes.iter().any(|vote| vote.signer == cert.signer) {
            votes.push(cert);
        }
        first
    }

    /// Removes and returns all votes parked for the given block.
    pub(crate) fn release(&mut self, hash: &replica::BlockHash) -> Vec<replica::PartialCert> {
        self.pending.remove(hash).unwrap_or_default()
    }

    /// Drops all parked votes. A fresh proposal supersedes them; peers resend
    /// votes that still matter.
    pub(crate) fn clear_pending(&mut self) {
        self.pending = HashMap::new();
    }

    /// Drops verified-vote entries that can no longer become a useful QC:
    /// those whose block is unknown, or whose block's view is not above
    /// `high_view` (a newer certificate already exists).
    pub(crate) fn sweep(&mut self, high_view: replica::ViewNumber, store: &BlockStore) {
        self.verified.retain(|hash, _| {
            store
                .get(hash)
                .is_some_and(|block| block.view > high_view)
        });
    }
}
