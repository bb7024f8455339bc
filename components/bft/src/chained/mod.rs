//! The chained module contains the implementation of the chained HotStuff
//! consensus protocol: a three-chain, leader-based protocol in which each
//! block carries a quorum certificate for its predecessor, and a block is
//! decided once it heads a chain of three blocks linked by direct parent
//! edges.
use std::sync::Arc;

use hotstuff_roles::replica;
use zksync_concurrency::{ctx, error::Wrap as _, metrics::LatencyHistogramExt as _, sync};

use crate::{metrics, vote_pool::VotePool, Config, InputMessage, OutputMessage};

mod block;
mod fetcher;
mod proposal;
mod proposer;
#[cfg(test)]
pub(crate) mod testonly;
#[cfg(test)]
mod tests;
mod vote;

/// The StateMachine struct contains the state of the replica and implements
/// all the logic of chained HotStuff. It is the sole writer of the protocol
/// variables; every inbound event is funneled through its mailbox and
/// processed by one consumer loop, which serializes all effects.
#[derive(Debug)]
pub(crate) struct StateMachine {
    /// Consensus configuration.
    pub(crate) config: Arc<Config>,
    /// Channel through which the replica sends network intents.
    pub(super) outbound_channel: ctx::channel::UnboundedSender<OutputMessage>,
    /// Channel through which the replica receives input messages.
    pub(crate) inbound_channel: sync::prunable_mpsc::Receiver<InputMessage>,
    /// Watch through which newly observed quorum certificates are published
    /// to the view synchronizer, so that it may advance the view.
    pub(crate) sync_info_sender: sync::watch::Sender<Option<replica::SyncInfo>>,

    /// The highest view this replica has voted in. Never signs twice in the
    /// same view.
    pub(crate) last_vote: replica::ViewNumber,
    /// The block this replica has committed to not vote against.
    pub(crate) locked_block: replica::Block,
    /// The deepest block applied to the application state machine.
    pub(crate) executed_block: replica::Block,
    /// The highest block known to extend the highest quorum certificate.
    pub(crate) leaf_block: replica::Block,
    /// The highest-view quorum certificate this replica has observed.
    pub(crate) high_qc: replica::QuorumCert,

    /// Buffered votes, verified and parked.
    pub(crate) vote_pool: VotePool,
    /// Hash of the block the outstanding fetch is for, if any. At most one
    /// fetch is in flight at any time.
    pub(crate) pending_fetch: Option<replica::BlockHash>,
}

impl StateMachine {
    /// Creates a new [`StateMachine`] instance. All protocol variables start
    /// at the genesis block; the genesis quorum certificate is synthesized by
    /// the signer, and failure to produce it is fatal since the replica
    /// cannot participate without an initial high QC.
    pub(crate) async fn start(
        ctx: &ctx::Ctx,
        config: Arc<Config>,
        outbound_channel: ctx::channel::UnboundedSender<OutputMessage>,
        inbound_channel: sync::prunable_mpsc::Receiver<InputMessage>,
        sync_info_sender: sync::watch::Sender<Option<replica::SyncInfo>>,
    ) -> ctx::Result<Self> {
        let genesis = config.block_store.genesis().clone();
        let high_qc = config
            .signer
            .create_quorum_cert(ctx, &genesis, &[])
            .await
            .wrap("create_quorum_cert(genesis)")?;
        let vote_pool = VotePool::new(config.quorum_size(), config.signer.clone());

        Ok(Self {
            config,
            outbound_channel,
            inbound_channel,
            sync_info_sender,
            last_vote: genesis.view,
            locked_block: genesis.clone(),
            executed_block: genesis.clone(),
            leaf_block: genesis,
            high_qc,
            vote_pool,
            pending_fetch: None,
        })
    }

    /// Runs a loop to process input messages. This is the main entry point
    /// for the state machine; errors that indicate dropped messages are
    /// logged and the loop continues, internal errors stop the replica.
    pub(crate) async fn run(mut self, ctx: &ctx::Ctx) -> ctx::Result<()> {
        tracing::info!("Starting chained HotStuff replica.");

        loop {
            let recv = self.inbound_channel.recv(ctx).await;

            // Check for cancellation.
            if !ctx.is_active() {
                return Ok(());
            }
            let Ok(message) = recv else { continue };

            // Process the message.
            let now = ctx.now();
            let label = match message {
                InputMessage::Proposal(block) => {
                    let res = match self
                        .on_proposal(ctx, block)
                        .await
                        .wrap("on_proposal()")
                    {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            match err {
                                // If the error is internal, we stop here.
                                proposal::Error::Internal(err) => {
                                    tracing::error!(
                                        "on_proposal: internal error: {err:#}"
                                    );
                                    return Err(err);
                                }
                                // If the error is due to an old message, we log it at a lower level.
                                proposal::Error::Old { .. } => {
                                    tracing::debug!("on_proposal: {err:#}");
                                }
                                // Failing to sign our own vote may cost us the view.
                                proposal::Error::SignFailed(_) => {
                                    tracing::error!("on_proposal: {err:#}");
                                }
                                _ => {
                                    tracing::warn!("on_proposal: {err:#}");
                                }
                            }
                            Err(())
                        }
                    };
                    metrics::InputMessageLabel::Proposal.with_result(&res)
                }
                InputMessage::Vote(cert) => {
                    let res = match self.on_vote(ctx, cert).await.wrap("on_vote()") {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            match err {
                                // If the error is internal, we stop here.
                                vote::Error::Internal(err) => {
                                    tracing::error!("on_vote: internal error: {err:#}");
                                    return Err(err);
                                }
                                // A vote whose block is still being fetched
                                // is business as usual.
                                vote::Error::UnknownBlock { .. } => {
                                    tracing::debug!("on_vote: {err:#}");
                                }
                                // Stale and duplicate votes are protocol
                                // violations, like the rest.
                                _ => {
                                    tracing::warn!("on_vote: {err:#}");
                                }
                            }
                            Err(())
                        }
                    };
                    metrics::InputMessageLabel::Vote.with_result(&res)
                }
                InputMessage::Block(block) => {
                    let res = self.on_block(ctx, block).await.wrap("on_block()");
                    if let Err(err) = res {
                        tracing::error!("on_block: internal error: {err:#}");
                        return Err(err);
                    }
                    metrics::InputMessageLabel::Block.with_result::<()>(&Ok(()))
                }
                InputMessage::NewView(qc) => {
                    let res = self.on_new_view(ctx, qc).await.wrap("on_new_view()");
                    if let Err(err) = res {
                        tracing::error!("on_new_view: internal error: {err:#}");
                        return Err(err);
                    }
                    metrics::InputMessageLabel::NewView.with_result::<()>(&Ok(()))
                }
                InputMessage::Propose => {
                    let res = match self.propose(ctx).await.wrap("propose()") {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            match err {
                                // If the error is internal, we stop here.
                                proposal::Error::Internal(err) => {
                                    tracing::error!("propose: internal error: {err:#}");
                                    return Err(err);
                                }
                                _ => {
                                    // Only the local vote on our own proposal
                                    // failed; the proposal itself went out.
                                    tracing::warn!("propose: self-vote dropped: {err:#}");
                                }
                            }
                            Err(())
                        }
                    };
                    metrics::InputMessageLabel::Propose.with_result(&res)
                }
                InputMessage::SkipView => {
                    self.create_dummy();
                    metrics::InputMessageLabel::SkipView.with_result::<()>(&Ok(()))
                }
                InputMessage::Timeout(view) => {
                    self.on_timeout(view);
                    metrics::InputMessageLabel::Timeout.with_result::<()>(&Ok(()))
                }
            };
            metrics::METRICS.message_processing_latency[&label].observe_latency(ctx.now() - now);
        }
    }

    /// Processes a NEW-VIEW message carrying a peer's highest quorum
    /// certificate.
    pub(crate) async fn on_new_view(
        &mut self,
        ctx: &ctx::Ctx,
        qc: replica::QuorumCert,
    ) -> ctx::Result<()> {
        self.update_high_qc(ctx, qc).await
    }

    /// Raises the vote-view floor after a pacemaker timeout: this replica
    /// will never vote in `view` or below again.
    pub(crate) fn on_timeout(&mut self, view: replica::ViewNumber) {
        self.last_vote = self.last_vote.max(view);
    }

    /// Adopts `qc` as the new high QC, and the block it certifies as the new
    /// leaf, iff it certifies a higher view than the current high QC does.
    /// Certificates that fail verification or certify an unknown block are
    /// ignored; a missing block under the *current* high QC means the local
    /// store is corrupted, which is fatal.
    pub(crate) async fn update_high_qc(
        &mut self,
        ctx: &ctx::Ctx,
        qc: replica::QuorumCert,
    ) -> ctx::Result<()> {
        if !self.config.verifier.verify_quorum_cert(ctx, &qc).await? {
            tracing::info!(
                "update_high_qc: certificate for view {} failed verification, ignoring.",
                qc.view
            );
            return Ok(());
        }
        let Some(new_block) = self.config.block_store.get(&qc.block_hash) else {
            tracing::info!(
                "update_high_qc: block referenced by the certificate is unknown, ignoring."
            );
            return Ok(());
        };
        let Some(old_block) = self.config.block_store.get(&self.high_qc.block_hash) else {
            return Err(anyhow::anyhow!(
                "block referenced by the current high QC is missing from the store"
            )
            .into());
        };

        if new_block.view > old_block.view {
            tracing::debug!("update_high_qc: new high QC at view {}.", qc.view);
            self.high_qc = qc;
            self.leaf_block = new_block;
            metrics::METRICS.leaf_view.set(self.leaf_block.view.0);
        }
        Ok(())
    }

    /// Resolves the block certified by the justification `block` carries.
    fn qc_ref(&self, block: &replica::Block) -> Option<replica::Block> {
        let qc = block.justification.as_ref()?;
        self.config.block_store.get(&qc.block_hash)
    }

    /// The chain walker, invoked for every newly accepted block `b`. Walks
    /// the certificate chain `b → b1 → b2 → b3` and performs, stopping at the
    /// first missing link:
    ///
    /// 1. PRE-COMMIT: adopt `b`'s justification as the high QC.
    /// 2. COMMIT: lock `b2` if it is newer than the current lock.
    /// 3. DECIDE: if `b1`, `b2`, `b3` are linked by direct parent edges,
    ///    execute `b3` and its unexecuted ancestors.
    pub(crate) async fn update(
        &mut self,
        ctx: &ctx::Ctx,
        block: &replica::Block,
    ) -> ctx::Result<()> {
        let Some(qc) = block.justification.clone() else {
            return Ok(());
        };
        let Some(block1) = self.config.block_store.get(&qc.block_hash) else {
            return Ok(());
        };
        tracing::debug!("PRE_COMMIT: block at view {}.", block1.view);
        self.update_high_qc(ctx, qc).await?;

        let Some(block2) = self.qc_ref(&block1) else {
            return Ok(());
        };
        if block2.view > self.locked_block.view {
            tracing::debug!("COMMIT: locking block at view {}.", block2.view);
            metrics::METRICS.locked_view.set(block2.view.0);
            self.locked_block = block2.clone();
        }

        let Some(block3) = self.qc_ref(&block2) else {
            return Ok(());
        };
        if block1.parent_hash == block2.hash() && block2.parent_hash == block3.hash() {
            tracing::debug!("DECIDE: executing up to view {}.", block3.view);
            self.execute_chain(ctx, &block3).await?;
        }
        Ok(())
    }

    /// Executes every unexecuted ancestor of `block` and then `block` itself,
    /// in ascending view order, skipping dummy blocks, and advances
    /// `executed_block`. The walk stops at the first ancestor that is already
    /// executed or absent from the store.
    async fn execute_chain(&mut self, ctx: &ctx::Ctx, block: &replica::Block) -> ctx::Result<()> {
        if block.view <= self.executed_block.view {
            return Ok(());
        }

        // Collect the unexecuted suffix of the ancestor chain, newest first.
        let mut chain = Vec::new();
        let mut current = block.clone();
        loop {
            let parent = self.config.block_store.get(&current.parent_hash);
            chain.push(current);
            match parent {
                Some(parent) if parent.view > self.executed_block.view => current = parent,
                _ => break,
            }
        }

        for block in chain.iter().rev() {
            // Dummy blocks carry no command and are never executed.
            if block.is_dummy() {
                continue;
            }
            tracing::debug!("EXEC: block at view {}.", block.view);
            self.config
                .executor
                .exec(ctx, &block.command)
                .await
                .wrap("executor.exec()")?;
        }

        self.executed_block = block.clone();
        metrics::METRICS.executed_view.set(self.executed_block.view.0);
        Ok(())
    }
}
