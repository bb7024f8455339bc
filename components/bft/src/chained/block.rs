use hotstuff_roles::replica;
use zksync_concurrency::ctx;

use super::{vote, StateMachine};

impl StateMachine {
    /// Processes a previously missing block delivered by the network layer.
    /// Re-delivery is harmless: storing is idempotent and the parked votes
    /// are drained only once.
    pub(crate) async fn on_block(
        &mut self,
        ctx: &ctx::Ctx,
        block: replica::Block,
    ) -> ctx::Result<()> {
        self.deliver(ctx, block).await
    }

    /// Stores a block and feeds every vote parked for it back through vote
    /// processing. Individual votes may still be dropped (stale by now,
    /// invalid signature); only internal errors propagate.
    pub(super) async fn deliver(
        &mut self,
        ctx: &ctx::Ctx,
        block: replica::Block,
    ) -> ctx::Result<()> {
        let hash = block.hash();
        self.config.block_store.store(block);
        if self.pending_fetch == Some(hash) {
            // The outstanding fetch just completed.
            self.pending_fetch = None;
        }

        let parked = self.vote_pool.release(&hash);
        if parked.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "deliver: processing {} parked votes for block {:?}.",
            parked.len(),
            hash
        );
        for cert in parked {
            match self.on_vote(ctx, cert).await {
                Ok(()) => {}
                Err(vote::Error::Internal(err)) => return Err(err),
                Err(err) => tracing::debug!("deliver: parked vote dropped: {err:#}"),
            }
        }
        Ok(())
    }
}
