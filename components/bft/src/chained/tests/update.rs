use assert_matches::assert_matches;
use hotstuff_roles::replica;
use rand::Rng as _;
use zksync_concurrency::ctx;

use crate::{
    chained::{proposal, testonly::UnitTestHarness},
    testonly,
};

#[tokio::test]
async fn genesis_state_is_a_fixed_point() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let mut util = UnitTestHarness::new(ctx).await;

    let genesis = util.genesis();
    assert_eq!(util.replica.high_qc.block_hash, genesis.hash());
    assert_eq!(util.replica.leaf_block, genesis);
    assert_eq!(util.replica.locked_block, genesis);
    assert_eq!(util.replica.executed_block, genesis);
    assert_eq!(util.replica.last_vote, replica::ViewNumber(0));

    // Walking the chain from genesis changes nothing: it has no
    // justification to follow.
    util.replica.update(ctx, &genesis).await.unwrap();
    assert_eq!(util.replica.leaf_block, genesis);
    assert_eq!(util.replica.locked_block, genesis);
    assert_eq!(util.replica.executed_block, genesis);
    assert!(util.executor.executed().is_empty());
}

#[tokio::test]
async fn happy_path_three_chain_decides_the_first_block() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let mut util = UnitTestHarness::new(ctx).await;
    let genesis = util.genesis();

    let b1 = util.produce_block(ctx).await;
    assert_eq!(util.replica.locked_block, genesis);
    assert_eq!(util.replica.executed_block, genesis);

    let b2 = util.produce_block(ctx).await;
    assert_eq!(util.replica.locked_block, genesis);

    // B3 carries QC(B2): the walker locks B1, and the three-chain it
    // completes ends at genesis, so nothing is executed yet.
    let b3 = util.produce_block(ctx).await;
    assert_eq!(util.replica.locked_block.hash(), b1.hash());
    assert_eq!(util.replica.executed_block, genesis);
    assert!(util.executor.executed().is_empty());

    // B4 carries QC(B3): B1 → B2 → B3 is a direct three-chain, B1 is decided.
    let b4 = util.produce_block(ctx).await;
    assert_eq!(util.replica.locked_block.hash(), b2.hash());
    assert_eq!(util.replica.executed_block.hash(), b1.hash());
    assert_eq!(util.executor.executed(), vec![b1.command.clone()]);

    // One more view retires B2 as well, in order.
    util.produce_block(ctx).await;
    assert_eq!(util.replica.executed_block.hash(), b2.hash());
    assert_eq!(
        util.executor.executed(),
        vec![b1.command.clone(), b2.command.clone()]
    );

    // Monotonicity of the protocol variables across the run.
    assert!(util.replica.last_vote >= b4.view);
    assert!(util.replica.locked_block.view >= b2.view);
    assert!(util.replica.high_qc.view >= util.replica.locked_block.view);
    assert!(util.replica.locked_block.view >= util.replica.executed_block.view);
}

#[tokio::test]
async fn skipped_view_produces_a_dummy_that_never_executes() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let mut util = UnitTestHarness::new(ctx).await;

    let b1 = util.produce_block(ctx).await;

    // View 2 is skipped: the pacemaker raises the vote floor and has the
    // next leader bridge the gap with a dummy block.
    util.replica.on_timeout(replica::ViewNumber(2));
    util.replica.create_dummy();
    let dummy = util.replica.leaf_block.clone();
    assert_eq!(dummy.view, replica::ViewNumber(2));
    assert!(dummy.is_dummy());
    assert_eq!(util.replica.high_qc.block_hash, b1.hash());

    // The view-3 proposal extends the dummy but justifies with QC(B1).
    let b3 = util.produce_block(ctx).await;
    assert_eq!(b3.view, replica::ViewNumber(3));
    assert_eq!(b3.parent_hash, dummy.hash());

    // Neither B4 nor B5 decides anything: every three-chain they complete
    // crosses the dummy, which breaks the direct parent links.
    util.produce_block(ctx).await;
    assert_eq!(util.replica.executed_block, util.genesis());
    util.produce_block(ctx).await;
    assert_eq!(util.replica.executed_block, util.genesis());

    // B6 completes the direct three-chain B3 → B4 → B5. Executing B3 first
    // retires B1 and skips the dummy.
    let b6 = util.produce_block(ctx).await;
    assert_eq!(b6.view, replica::ViewNumber(6));
    assert_eq!(util.replica.executed_block.hash(), b3.hash());
    assert_eq!(
        util.executor.executed(),
        vec![b1.command.clone(), b3.command.clone()]
    );
}

#[tokio::test]
async fn timeout_raises_the_vote_floor() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let mut util = UnitTestHarness::new(ctx).await;

    util.replica.on_timeout(replica::ViewNumber(5));
    assert_eq!(util.replica.last_vote, replica::ViewNumber(5));

    // The floor never goes down.
    util.replica.on_timeout(replica::ViewNumber(3));
    assert_eq!(util.replica.last_vote, replica::ViewNumber(5));

    // Proposals at or below the floor are refused.
    let mut block = util.new_proposal(ctx);
    block.view = replica::ViewNumber(5);
    let res = util.replica.on_proposal(ctx, block).await;
    assert_matches!(res, Err(proposal::Error::Old { .. }));
}

#[tokio::test]
async fn new_view_certificate_advances_the_high_qc() {
    zksync_concurrency::testonly::abort_on_panic();
    let ctx = &ctx::test_root(&ctx::RealClock);
    let mut util = UnitTestHarness::new(ctx).await;

    let b1 = util.produce_block(ctx).await;

    // A certificate for an unknown block is ignored.
    let unknown: replica::Block = ctx.rng().gen();
    let votes: Vec<_> = (0..3)
        .map(|id| testonly::make_vote(replica::ReplicaId(id), &unknown))
        .collect();
    let qc = testonly::make_quorum_cert(&unknown, &votes);
    util.replica.on_new_view(ctx, qc).await.unwrap();
    assert_eq!(util.replica.high_qc.block_hash, b1.hash());

    // A valid certificate for a newer, known block advances high QC and leaf.
    let b2 = replica::Block {
        parent_hash: b1.hash(),
        justification: Some(util.replica.high_qc.clone()),
        view: replica::ViewNumber(2),
        proposer: replica::ReplicaId(2),
        command: ctx.rng().gen(),
    };
    util.replica.config.block_store.store(b2.clone());
    let votes: Vec<_> = (0..3)
        .map(|id| testonly::make_vote(replica::ReplicaId(id), &b2))
        .collect();
    let qc = testonly::make_quorum_cert(&b2, &votes);
    util.replica.on_new_view(ctx, qc.clone()).await.unwrap();
    assert_eq!(util.replica.high_qc, qc);
    assert_eq!(util.replica.leaf_block.hash(), b2.hash());

    // A sub-quorum certificate never passes verification.
    let b3 = replica::Block {
        parent_hash: b2.hash(),
        justification: Some(qc),
        view: replica::ViewNumber(3),
        proposer: replica::ReplicaId(3),
        command: ctx.rng().gen(),
    };
    util.replica.config.block_store.store(b3.clone());
    let votes: Vec<_> = (0..2)
        .map(|id| testonly::make_vote(replica::ReplicaId(id), &b3))
        .collect();
    let weak_qc = testonly::make_quorum_cert(&b3, &votes);
    util.replica.on_new_view(ctx, weak_qc).await.unwrap();
    assert_eq!(util.replica.leaf_block.hash(), b2.hash());
}
