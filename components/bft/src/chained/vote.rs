use hotstuff_roles::replica;
use zksync_concurrency::{ctx, error::Wrap};

use super::StateMachine;

/// Errors that can occur when processing a vote.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// Vote for a block that is not in the store yet. The vote is parked and
    /// the block is being fetched from peers.
    #[error("vote for an unknown block, parked (block hash: {hash:?})")]
    UnknownBlock {
        /// Hash of the unknown block.
        hash: replica::BlockHash,
    },
    /// Vote for a block that is not above the current leaf; a certificate
    /// for it or for a newer block already exists.
    #[error("stale vote (vote view: {vote_view}, leaf view: {leaf_view})")]
    Old {
        /// View of the block voted for.
        vote_view: replica::ViewNumber,
        /// View of the current leaf.
        leaf_view: replica::ViewNumber,
    },
    /// Invalid signature.
    #[error("partial certificate failed verification (signer: {signer})")]
    InvalidSignature {
        /// Claimed signer of the vote.
        signer: replica::ReplicaId,
    },
    /// We already count a vote from the same replica for the same block.
    #[error("duplicate vote (signer: {signer})")]
    DuplicateSigner {
        /// Signer of the vote.
        signer: replica::ReplicaId,
    },
    /// Could not aggregate the quorum into a certificate.
    #[error("failed to aggregate a quorum certificate: {0:#}")]
    Aggregation(#[source] anyhow::Error),
    /// Internal error. Unlike other error types, this one isn't supposed to be easily recoverable.
    #[error(transparent)]
    Internal(#[from] ctx::Error),
}

impl Wrap for Error {
    fn with_wrap<C: std::fmt::Display + Send + Sync + 'static, F: FnOnce() -> C>(
        self,
        f: F,
    ) -> Self {
        match self {
            Error::Internal(err) => Error::Internal(err.with_wrap(f)),
            err => err,
        }
    }
}

impl StateMachine {
    /// Processes a vote, sent to this replica as the leader of the next view.
    /// Whatever the outcome, stale entries are swept from the vote pool
    /// afterwards.
    pub(crate) async fn on_vote(
        &mut self,
        ctx: &ctx::Ctx,
        cert: replica::PartialCert,
    ) -> Result<(), Error> {
        let res = self.process_vote(ctx, cert).await;
        // Entries whose block is unknown or no newer than the leaf can never
        // become a useful certificate anymore.
        self.vote_pool
            .sweep(self.leaf_block.view, &self.config.block_store);
        res
    }

    async fn process_vote(
        &mut self,
        ctx: &ctx::Ctx,
        cert: replica::PartialCert,
    ) -> Result<(), Error> {
        // ----------- Resolving the block --------------

        let Some(block) = self.config.block_store.get(&cert.block_hash) else {
            let hash = cert.block_hash;
            self.fetch_block_for_vote(cert);
            return Err(Error::UnknownBlock { hash });
        };

        // A certificate at or above this view already exists.
        if block.view <= self.leaf_block.view {
            return Err(Error::Old {
                vote_view: block.view,
                leaf_view: self.leaf_block.view,
            });
        }

        // ----------- Checking the vote --------------

        if !self.config.verifier.verify_partial_cert(ctx, &cert).await? {
            return Err(Error::InvalidSignature {
                signer: cert.signer,
            });
        }

        if self.vote_pool.is_duplicate(&cert) {
            return Err(Error::DuplicateSigner {
                signer: cert.signer,
            });
        }

        // ----------- Recording the vote --------------

        tracing::debug!(
            "on_vote: vote from replica {} for block at view {}.",
            cert.signer,
            block.view
        );

        let qc = match self.vote_pool.record_verified(ctx, &block, cert).await {
            Ok(None) => return Ok(()),
            Ok(Some(qc)) => qc,
            Err(ctx::Error::Internal(err)) => return Err(Error::Aggregation(err)),
            Err(err @ ctx::Error::Canceled(_)) => return Err(Error::Internal(err)),
        };

        // ----------- We have a QC. Now we process it. --------------

        tracing::info!(
            "on_vote: quorum certificate formed for block at view {} with {} signers.",
            qc.view,
            qc.signers.len()
        );

        self.update_high_qc(ctx, qc.clone())
            .await
            .wrap("update_high_qc()")?;

        // Signal the view synchronizer so that it may advance the view.
        self.sync_info_sender
            .send(Some(replica::SyncInfo { qc }))
            .ok();

        Ok(())
    }
}
