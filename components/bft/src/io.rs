//! Input and output messages of the consensus component. Inputs come from the
//! network layer and from the pacemaker; outputs are intents performed by the
//! network layer, so that no I/O happens inside the state machine step.
use hotstuff_roles::replica;

/// All the messages consumed by the consensus component.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMessage {
    /// A proposal broadcast by the leader of some view.
    Proposal(replica::Block),
    /// A vote sent to this replica as the leader of the next view.
    Vote(replica::PartialCert),
    /// A previously missing block, delivered by the network layer.
    Block(replica::Block),
    /// A NEW-VIEW message carrying a peer's highest quorum certificate.
    NewView(replica::QuorumCert),
    /// Pacemaker: this replica is the leader of the next view, propose now.
    Propose,
    /// Pacemaker: the current view is being skipped; advance the leaf over it
    /// with a dummy block.
    SkipView,
    /// Pacemaker: the given view timed out; never vote in it or below it
    /// again.
    Timeout(replica::ViewNumber),
}

/// All the messages the consensus component sends to the network layer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    /// Broadcast a proposal to every replica.
    Proposal(replica::Block),
    /// Send a vote to the leader of the next view.
    Vote {
        /// The leader the vote is addressed to.
        recipient: replica::ReplicaId,
        /// The vote itself.
        cert: replica::PartialCert,
    },
    /// Ask peers for a missing block. The network layer keeps at most one
    /// fetch in flight: a new request replaces the outstanding one. The
    /// fetched block comes back as [`InputMessage::Block`].
    FetchBlock(replica::BlockHash),
    /// Cancel the outstanding fetch, if any. Cancellation is cooperative: a
    /// response already in flight is delivered anyway and ignored.
    CancelFetch,
}
