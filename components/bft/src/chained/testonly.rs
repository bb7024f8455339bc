use std::sync::Arc;

use assert_matches::assert_matches;
use hotstuff_roles::replica;
use hotstuff_storage::BlockStore;
use rand::Rng as _;
use zksync_concurrency::{
    ctx,
    sync::{self, prunable_mpsc},
};

use crate::{
    chained::{vote, StateMachine},
    create_input_channel, testonly, Acceptor, Config, InputMessage, OutputMessage, Signer,
};

pub(crate) const NUM_REPLICAS: usize = 4;

/// `UnitTestHarness` provides various utilities for unit tests. It drives a
/// single state machine directly, fabricating the other replicas' messages
/// with the deterministic test crypto.
///
/// It should be instantiated once for every test case.
pub(crate) struct UnitTestHarness {
    pub(crate) replica: StateMachine,
    pub(crate) executor: testonly::RecordingExecutor,
    pub(crate) outbound_channel: ctx::channel::UnboundedReceiver<OutputMessage>,
    pub(crate) _inbound_channel: prunable_mpsc::Sender<InputMessage>,
    pub(crate) sync_info_channel: sync::watch::Receiver<Option<replica::SyncInfo>>,
}

impl UnitTestHarness {
    /// Creates a new harness with the standard 4-replica committee, replica 0
    /// under test.
    pub(crate) async fn new(ctx: &ctx::Ctx) -> UnitTestHarness {
        Self::new_with(
            ctx,
            Arc::new(testonly::TestSigner(replica::ReplicaId(0))),
            Box::new(testonly::TestAcceptor::Accept),
        )
        .await
    }

    pub(crate) async fn new_with(
        ctx: &ctx::Ctx,
        signer: Arc<dyn Signer>,
        acceptor: Box<dyn Acceptor>,
    ) -> UnitTestHarness {
        let committee =
            replica::Committee::new((0..NUM_REPLICAS as u64).map(replica::ReplicaId)).unwrap();
        let executor = testonly::RecordingExecutor::default();
        let config = Arc::new(Config {
            replica_id: replica::ReplicaId(0),
            committee: committee.clone(),
            block_store: Arc::new(BlockStore::new(replica::Block::genesis())),
            signer,
            verifier: Arc::new(testonly::TestVerifier {
                quorum_size: committee.quorum_size(),
            }),
            command_queue: Box::new(testonly::RandomCommandQueue(64)),
            acceptor,
            executor: Box::new(executor.clone()),
            leader_rotation: Box::new(testonly::RoundRobin(committee)),
        });

        let (outbound_channel_send, outbound_channel_recv) = ctx::channel::unbounded();
        let (inbound_channel_send, inbound_channel_recv) = create_input_channel();
        let (sync_info_sender, sync_info_recv) = sync::watch::channel(None);

        let replica = StateMachine::start(
            ctx,
            config,
            outbound_channel_send,
            inbound_channel_recv,
            sync_info_sender,
        )
        .await
        .unwrap();

        UnitTestHarness {
            replica,
            executor,
            outbound_channel: outbound_channel_recv,
            _inbound_channel: inbound_channel_send,
            sync_info_channel: sync_info_recv,
        }
    }

    pub(crate) fn genesis(&self) -> replica::Block {
        self.replica.config.block_store.genesis().clone()
    }

    pub(crate) fn committee(&self) -> &replica::Committee {
        &self.replica.config.committee
    }

    pub(crate) fn view_leader(&self, view: replica::ViewNumber) -> replica::ReplicaId {
        self.replica.config.leader_rotation.get_leader(view)
    }

    /// Constructs the proposal the leader of the next view would broadcast,
    /// extending the replica's current leaf.
    pub(crate) fn new_proposal(&self, ctx: &ctx::Ctx) -> replica::Block {
        let view = self.replica.leaf_block.view.next();
        replica::Block {
            parent_hash: self.replica.leaf_block.hash(),
            justification: Some(self.replica.high_qc.clone()),
            view,
            proposer: self.view_leader(view),
            command: ctx.rng().gen(),
        }
    }

    /// A valid vote for `block` from the given replica.
    pub(crate) fn make_vote(
        &self,
        signer: replica::ReplicaId,
        block: &replica::Block,
    ) -> replica::PartialCert {
        testonly::make_vote(signer, block)
    }

    /// The last quorum certificate published to the view synchronizer.
    pub(crate) fn last_sync_info(&self) -> Option<replica::SyncInfo> {
        self.sync_info_channel.borrow().clone()
    }

    pub(crate) fn try_recv(&mut self) -> Option<OutputMessage> {
        self.outbound_channel.try_recv()
    }

    /// Drops everything queued on the outbound channel.
    pub(crate) fn drain_outbound(&mut self) {
        while self.try_recv().is_some() {}
    }

    /// Feeds votes for `block` from the whole committee. The quorum must form
    /// while doing so; once it has, the remaining votes must be rejected as
    /// stale.
    pub(crate) async fn process_votes_all(&mut self, ctx: &ctx::Ctx, block: &replica::Block) {
        let mut quorum_reached = false;
        for id in self.committee().members().to_vec() {
            let vote = self.make_vote(id, block);
            let res = self.replica.on_vote(ctx, vote).await;
            if quorum_reached {
                assert_matches!(res, Err(vote::Error::Old { .. }));
            } else {
                match res {
                    Ok(()) => {}
                    // Our own vote may already be in the pool via the
                    // self-vote path.
                    Err(vote::Error::DuplicateSigner { .. }) => {}
                    Err(err) => panic!("unexpected vote error: {err:#}"),
                }
                if self.replica.leaf_block.hash() == block.hash() {
                    quorum_reached = true;
                }
            }
        }
        assert!(quorum_reached);
    }

    /// Produces a block by executing a full view: process the next leader's
    /// proposal, then feed the committee's votes until the certificate forms.
    /// Returns the decided-upon proposal.
    pub(crate) async fn produce_block(&mut self, ctx: &ctx::Ctx) -> replica::Block {
        let block = self.new_proposal(ctx);
        self.replica.on_proposal(ctx, block.clone()).await.unwrap();
        self.drain_outbound();
        self.process_votes_all(ctx, &block).await;
        assert_eq!(self.replica.high_qc.block_hash, block.hash());
        block
    }
}
