use std::sync::Arc;

use assert_matches::assert_matches;
use hotstuff_roles::replica;
use hotstuff_storage::BlockStore;
use rand::{rngs::StdRng, Rng as _, SeedableRng as _};
use zksync_concurrency::{ctx, scope, sync, sync::prunable_mpsc::SelectionFunctionResult};

use crate::{
    create_input_channel, inbound_filter_predicate, inbound_selection_function, testonly, Config,
    InputMessage, OutputMessage,
};

fn make_config(executor: &testonly::RecordingExecutor) -> Config {
    let committee = replica::Committee::new((0..4).map(replica::ReplicaId)).unwrap();
    Config {
        replica_id: replica::ReplicaId(0),
        committee: committee.clone(),
        block_store: Arc::new(BlockStore::new(replica::Block::genesis())),
        signer: Arc::new(testonly::TestSigner(replica::ReplicaId(0))),
        verifier: Arc::new(testonly::TestVerifier {
            quorum_size: committee.quorum_size(),
        }),
        command_queue: Box::new(testonly::RandomCommandQueue(64)),
        acceptor: Box::new(testonly::TestAcceptor::Accept),
        executor: Box::new(executor.clone()),
        leader_rotation: Box::new(testonly::RoundRobin(committee)),
    }
}

#[tokio::test]
async fn replica_runs_a_view_through_the_channels() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    scope::run!(ctx, |ctx, s| async {
        let executor = testonly::RecordingExecutor::default();
        let config = make_config(&executor);
        let genesis = config.block_store.genesis().clone();

        let (outbound_channel_send, mut outbound_channel_recv) = ctx::channel::unbounded();
        let (inbound_channel_send, inbound_channel_recv) = create_input_channel();
        let (sync_info_sender, mut sync_info_recv) = sync::watch::channel(None);

        s.spawn_bg(async {
            Ok(config
                .run(
                    ctx,
                    outbound_channel_send,
                    inbound_channel_recv,
                    sync_info_sender,
                )
                .await?)
        });

        // The view-1 leader proposes; our vote goes out to the view-2 leader.
        let b1 = replica::Block {
            parent_hash: genesis.hash(),
            justification: Some(testonly::make_quorum_cert(&genesis, &[])),
            view: replica::ViewNumber(1),
            proposer: replica::ReplicaId(1),
            command: ctx.rng().gen(),
        };
        inbound_channel_send.send(InputMessage::Proposal(b1.clone()));

        let msg = outbound_channel_recv.recv(ctx).await?;
        assert_matches!(msg, OutputMessage::Vote { recipient, cert } => {
            assert_eq!(recipient, replica::ReplicaId(2));
            assert_eq!(cert.signer, replica::ReplicaId(0));
            assert_eq!(cert.block_hash, b1.hash());
        });

        // As the view-2 leader we collect the committee's votes; the quorum
        // certificate is published for the view synchronizer.
        for id in 1..4 {
            let vote = testonly::make_vote(replica::ReplicaId(id), &b1);
            inbound_channel_send.send(InputMessage::Vote(vote));
        }
        sync::wait_for(ctx, &mut sync_info_recv, |info| info.is_some()).await?;
        let sync_info = sync_info_recv.borrow().clone().unwrap();
        assert_eq!(sync_info.qc.block_hash, b1.hash());

        // The pacemaker fires the leader beat: our proposal extends B1 and
        // carries its certificate.
        inbound_channel_send.send(InputMessage::Propose);
        let msg = outbound_channel_recv.recv(ctx).await?;
        assert_matches!(msg, OutputMessage::Proposal(b2) => {
            assert_eq!(b2.view, replica::ViewNumber(2));
            assert_eq!(b2.parent_hash, b1.hash());
            assert_eq!(b2.justification, Some(sync_info.qc.clone()));
            assert_eq!(b2.proposer, replica::ReplicaId(0));
        });

        Ok::<(), anyhow::Error>(())
    })
    .await
    .unwrap();
}

#[test]
fn input_filter_rejects_proposals_without_justification() {
    let rng = &mut StdRng::seed_from_u64(48112);

    let mut block: replica::Block = rng.gen();
    block.justification = None;
    assert!(!inbound_filter_predicate(&InputMessage::Proposal(
        block.clone()
    )));

    block.justification = Some(rng.gen());
    assert!(inbound_filter_predicate(&InputMessage::Proposal(block)));
    assert!(inbound_filter_predicate(&InputMessage::Vote(rng.gen())));
    assert!(inbound_filter_predicate(&InputMessage::Propose));
}

#[test]
fn input_selection_discards_duplicate_votes() {
    let rng = &mut StdRng::seed_from_u64(90557);

    let vote: replica::PartialCert = rng.gen();
    let mut other: replica::PartialCert = rng.gen();
    other.signer = vote.signer;

    // Same signer, same block: the newer copy is dropped.
    assert_matches!(
        inbound_selection_function(
            &InputMessage::Vote(vote.clone()),
            &InputMessage::Vote(vote.clone())
        ),
        SelectionFunctionResult::DiscardNew
    );
    // Same signer, different block: kept.
    assert_matches!(
        inbound_selection_function(&InputMessage::Vote(vote.clone()), &InputMessage::Vote(other)),
        SelectionFunctionResult::Keep
    );
    // Unrelated messages: kept.
    assert_matches!(
        inbound_selection_function(&InputMessage::Vote(vote), &InputMessage::Propose),
        SelectionFunctionResult::Keep
    );
}
