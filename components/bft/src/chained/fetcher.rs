use hotstuff_roles::replica;

use super::StateMachine;
use crate::OutputMessage;

impl StateMachine {
    /// Parks a vote whose block is not known locally and, if it is the first
    /// vote parked for that block, asks the network layer to fetch the block
    /// from peers. The network layer keeps a single fetch slot, so issuing a
    /// request for a different block implicitly invalidates the previous one;
    /// at most one fetch is in flight at any time.
    pub(super) fn fetch_block_for_vote(&mut self, cert: replica::PartialCert) {
        let hash = cert.block_hash;
        if !self.vote_pool.park(cert) {
            // Another vote already triggered a fetch for this block.
            return;
        }
        tracing::debug!("fetching block {:?} for a parked vote.", hash);
        self.pending_fetch = Some(hash);
        self.outbound_channel.send(OutputMessage::FetchBlock(hash));
    }

    /// Cancels the outstanding fetch, if any. Cancellation is cooperative: a
    /// response already in flight will still be delivered and ignored.
    pub(super) fn cancel_fetch(&mut self) {
        if self.pending_fetch.take().is_some() {
            self.outbound_channel.send(OutputMessage::CancelFetch);
        }
    }
}
