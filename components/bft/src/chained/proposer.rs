use hotstuff_roles::replica;
use zksync_concurrency::ctx;

use super::{proposal, StateMachine};
use crate::{metrics, OutputMessage};

impl StateMachine {
    /// Creates a new proposal extending the current leaf and carrying the
    /// high QC, broadcasts it, and votes for it locally. Invoked by the
    /// pacemaker when this replica is the leader of the next view. An empty
    /// command queue still yields a (command-less) proposal: the view must
    /// advance either way.
    pub(crate) async fn propose(&mut self, ctx: &ctx::Ctx) -> Result<(), proposal::Error> {
        let command = self
            .config
            .command_queue
            .get_command(ctx)
            .await?
            .unwrap_or_default();

        let block = replica::Block {
            parent_hash: self.leaf_block.hash(),
            justification: Some(self.high_qc.clone()),
            view: self.leaf_block.view.next(),
            proposer: self.config.replica_id,
            command,
        };
        self.config.block_store.store(block.clone());

        tracing::debug!("propose: broadcasting block at view {}.", block.view);
        self.outbound_channel
            .send(OutputMessage::Proposal(block.clone()));

        // Self-vote: process our own proposal like any other.
        self.on_proposal(ctx, block).await
    }

    /// Advances the leaf over a skipped view with a dummy block, keeping view
    /// numbers continuous. Dummy blocks carry no justification, are never
    /// broadcast and are never executed. Invoked by the pacemaker when the
    /// leader of the current view stays silent.
    pub(crate) fn create_dummy(&mut self) {
        let dummy = replica::Block {
            parent_hash: self.leaf_block.hash(),
            justification: None,
            view: self.leaf_block.view.next(),
            proposer: self.config.replica_id,
            command: replica::Command::default(),
        };
        tracing::debug!("create_dummy: advancing the leaf to view {}.", dummy.view);
        self.config.block_store.store(dummy.clone());
        self.leaf_block = dummy;
        metrics::METRICS.leaf_view.set(self.leaf_block.view.0);
    }
}
