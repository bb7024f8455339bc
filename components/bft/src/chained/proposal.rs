use hotstuff_roles::replica;
use hotstuff_storage::MissingBlockError;
use zksync_concurrency::{ctx, error::Wrap};

use super::{vote, StateMachine};
use crate::OutputMessage;

/// Errors that can occur when processing a proposal.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// Proposal for a view this replica has already voted in.
    #[error("proposal for a view we already voted in (last vote: {last_vote})")]
    Old {
        /// Highest view this replica voted in.
        last_vote: replica::ViewNumber,
    },
    /// Proposal carries no quorum certificate.
    #[error("proposal carries no justification")]
    MissingJustification,
    /// The proposal extends neither the high QC nor the locked block.
    #[error("proposal is not safe to vote on (locked view: {locked_view})")]
    NotSafe {
        /// View of the locked block.
        locked_view: replica::ViewNumber,
    },
    /// The ancestry of the proposal cannot be determined yet because a block
    /// on the walk to the locked block is missing.
    #[error("cannot determine safety, ancestor block missing (block hash: {missing:?})")]
    MissingAncestor {
        /// Hash of the first missing ancestor.
        missing: replica::BlockHash,
    },
    /// The acceptor refused the proposed command.
    #[error("command rejected by the acceptor")]
    CommandRejected,
    /// Could not sign a vote for the proposal.
    #[error("failed to sign a vote: {0:#}")]
    SignFailed(#[source] anyhow::Error),
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
    /// Processes a proposal, ours or a peer's. If the proposal is safe to
    /// vote on and its command is admitted, the replica signs a vote, runs
    /// the chain walker, and routes the vote to the leader of the next view.
    pub(crate) async fn on_proposal(
        &mut self,
        ctx: &ctx::Ctx,
        block: replica::Block,
    ) -> Result<(), Error> {
        // ----------- Checking the proposal --------------

        // Never vote twice in the same view.
        if block.view <= self.last_vote {
            return Err(Error::Old {
                last_vote: self.last_vote,
            });
        }

        let Some(qc) = &block.justification else {
            return Err(Error::MissingJustification);
        };

        // Liveness rule: the certified block is newer than our lock.
        let qc_block = self.config.block_store.get(&qc.block_hash);
        let safe = match qc_block {
            Some(qc_block) if qc_block.view > self.locked_block.view => true,
            _ => {
                tracing::debug!("on_proposal: liveness rule failed, checking the safety rule.");
                // Safety rule: the proposal extends the locked block.
                match self.config.block_store.extends(&block, &self.locked_block) {
                    Ok(extends) => extends,
                    Err(MissingBlockError(missing)) => {
                        return Err(Error::MissingAncestor { missing })
                    }
                }
            }
        };
        if !safe {
            return Err(Error::NotSafe {
                locked_view: self.locked_block.view,
            });
        }

        // ----------- Command admission --------------

        if !self.config.acceptor.accept(ctx, &block.command).await? {
            return Err(Error::CommandRejected);
        }

        // ----------- All checks finished. Now we vote. --------------

        tracing::debug!(
            "on_proposal: voting for block at view {} from replica {}.",
            block.view,
            block.proposer
        );

        // A proposal supersedes whatever block we were fetching.
        self.cancel_fetch();

        let cert = match self.config.signer.create_partial_cert(ctx, &block).await {
            Ok(cert) => cert,
            Err(ctx::Error::Internal(err)) => return Err(Error::SignFailed(err)),
            Err(err @ ctx::Error::Canceled(_)) => return Err(Error::Internal(err)),
        };

        // Point of no return: the block is stored and the vote view is burnt.
        self.config.block_store.store(block.clone());
        self.last_vote = block.view;

        self.update(ctx, &block).await.wrap("update()")?;
        self.deliver(ctx, block.clone()).await.wrap("deliver()")?;
        // A fresh proposal supersedes every earlier parked vote; peers resend
        // votes that still matter.
        self.vote_pool.clear_pending();

        // Route the vote to the leader of the next view.
        let next_leader = self.config.leader_rotation.get_leader(self.last_vote.next());
        if next_leader == self.config.replica_id {
            match self.on_vote(ctx, cert).await {
                Ok(()) => {}
                Err(vote::Error::Internal(err)) => return Err(Error::Internal(err)),
                Err(err) => tracing::debug!("on_proposal: own vote dropped: {err:#}"),
            }
        } else {
            // Transmission failures are the network layer's business; votes
            // are not retried here, the protocol re-drives via timeouts.
            self.outbound_channel.send(OutputMessage::Vote {
                recipient: next_leader,
                cert,
            });
        }

        Ok(())
    }
}
