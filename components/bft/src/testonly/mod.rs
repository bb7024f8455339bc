//! Test collaborators: deterministic in-process crypto, a random command
//! source, acceptor switches, a recording executor and round-robin leader
//! rotation. These stand in for the external modules a deployment provides.
use std::sync::{Arc, Mutex};

use hotstuff_roles::replica;
use rand::Rng as _;
use sha2::{Digest as _, Sha256};
use zksync_concurrency::ctx;

use crate::{Acceptor, CommandQueue, Executor, LeaderRotation, Signer, Verifier};

/// The deterministic "signature" of a vote: a tagged hash over the signer,
/// block hash and view. [`TestVerifier`] recomputes it, so a fabricated vote
/// from any replica id verifies, which is exactly what tests need.
pub fn vote_signature(
    signer: replica::ReplicaId,
    block_hash: &replica::BlockHash,
    view: replica::ViewNumber,
) -> replica::Signature {
    let mut hasher = Sha256::new();
    hasher.update(b"vote");
    hasher.update(signer.0.to_be_bytes());
    hasher.update(block_hash.0);
    hasher.update(view.0.to_be_bytes());
    replica::Signature(hasher.finalize().to_vec())
}

/// The deterministic aggregated signature material over a set of signers.
pub fn aggregate_signature(
    block_hash: &replica::BlockHash,
    view: replica::ViewNumber,
    signers: &[replica::ReplicaId],
) -> replica::AggregateSignature {
    let mut hasher = Sha256::new();
    hasher.update(b"agg");
    hasher.update(block_hash.0);
    hasher.update(view.0.to_be_bytes());
    for signer in signers {
        hasher.update(signer.0.to_be_bytes());
    }
    replica::AggregateSignature(hasher.finalize().to_vec())
}

/// Creates a valid vote from the given replica for the given block.
pub fn make_vote(signer: replica::ReplicaId, block: &replica::Block) -> replica::PartialCert {
    let block_hash = block.hash();
    replica::PartialCert {
        signer,
        block_hash,
        view: block.view,
        signature: vote_signature(signer, &block_hash, block.view),
    }
}

/// Aggregates votes into a deterministic quorum certificate over the distinct
/// signers, in ascending order.
pub fn make_quorum_cert(
    block: &replica::Block,
    certs: &[replica::PartialCert],
) -> replica::QuorumCert {
    let mut signers: Vec<_> = certs.iter().map(|cert| cert.signer).collect();
    signers.sort();
    signers.dedup();
    let block_hash = block.hash();
    let signature = aggregate_signature(&block_hash, block.view, &signers);
    replica::QuorumCert {
        block_hash,
        view: block.view,
        signers,
        signature,
    }
}

/// Deterministic signer for the given replica id.
#[derive(Debug)]
pub struct TestSigner(pub replica::ReplicaId);

#[async_trait::async_trait]
impl Signer for TestSigner {
    async fn create_partial_cert(
        &self,
        _ctx: &ctx::Ctx,
        block: &replica::Block,
    ) -> ctx::Result<replica::PartialCert> {
        Ok(make_vote(self.0, block))
    }

    async fn create_quorum_cert(
        &self,
        _ctx: &ctx::Ctx,
        block: &replica::Block,
        certs: &[replica::PartialCert],
    ) -> ctx::Result<replica::QuorumCert> {
        Ok(make_quorum_cert(block, certs))
    }
}

/// A signer that can still aggregate certificates, but whose voting key is
/// unavailable: signing a vote fails.
#[derive(Debug)]
pub struct FailingSigner;

#[async_trait::async_trait]
impl Signer for FailingSigner {
    async fn create_partial_cert(
        &self,
        _ctx: &ctx::Ctx,
        _block: &replica::Block,
    ) -> ctx::Result<replica::PartialCert> {
        Err(anyhow::anyhow!("signing key unavailable").into())
    }

    async fn create_quorum_cert(
        &self,
        _ctx: &ctx::Ctx,
        block: &replica::Block,
        certs: &[replica::PartialCert],
    ) -> ctx::Result<replica::QuorumCert> {
        Ok(make_quorum_cert(block, certs))
    }
}

/// Verifier matching [`TestSigner`]: recomputes the deterministic signature
/// material and checks the quorum rule.
#[derive(Debug)]
pub struct TestVerifier {
    /// Number of distinct signers a quorum certificate must carry.
    pub quorum_size: usize,
}

#[async_trait::async_trait]
impl Verifier for TestVerifier {
    async fn verify_partial_cert(
        &self,
        _ctx: &ctx::Ctx,
        cert: &replica::PartialCert,
    ) -> ctx::Result<bool> {
        Ok(cert.signature == vote_signature(cert.signer, &cert.block_hash, cert.view))
    }

    async fn verify_quorum_cert(
        &self,
        _ctx: &ctx::Ctx,
        qc: &replica::QuorumCert,
    ) -> ctx::Result<bool> {
        if qc.signers.len() < self.quorum_size {
            return Ok(false);
        }
        if qc.signers.windows(2).any(|w| w[0] >= w[1]) {
            return Ok(false);
        }
        Ok(qc.signature == aggregate_signature(&qc.block_hash, qc.view, &qc.signers))
    }
}

/// Command queue producing random commands of up to the given size.
#[derive(Debug)]
pub struct RandomCommandQueue(pub usize);

#[async_trait::async_trait]
impl CommandQueue for RandomCommandQueue {
    async fn get_command(&self, ctx: &ctx::Ctx) -> ctx::Result<Option<replica::Command>> {
        let rng = &mut ctx.rng();
        let size = rng.gen_range(1..=self.0);
        Ok(Some(replica::Command(
            (0..size).map(|_| rng.gen()).collect(),
        )))
    }
}

/// Command queue that never has anything to propose.
#[derive(Debug)]
pub struct EmptyCommandQueue;

#[async_trait::async_trait]
impl CommandQueue for EmptyCommandQueue {
    async fn get_command(&self, _ctx: &ctx::Ctx) -> ctx::Result<Option<replica::Command>> {
        Ok(None)
    }
}

/// Acceptor with a fixed verdict.
#[derive(Debug)]
pub enum TestAcceptor {
    /// Accept every command.
    Accept,
    /// Reject every command.
    Reject,
}

#[async_trait::async_trait]
impl Acceptor for TestAcceptor {
    async fn accept(&self, _ctx: &ctx::Ctx, _command: &replica::Command) -> ctx::Result<bool> {
        Ok(matches!(self, Self::Accept))
    }
}

/// Executor recording every executed command, for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor(Arc<Mutex<Vec<replica::Command>>>);

impl RecordingExecutor {
    /// The commands executed so far, in execution order.
    pub fn executed(&self) -> Vec<replica::Command> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Executor for RecordingExecutor {
    async fn exec(&self, _ctx: &ctx::Ctx, command: &replica::Command) -> ctx::Result<()> {
        self.0.lock().unwrap().push(command.clone());
        Ok(())
    }
}

/// Round-robin leader rotation over the committee.
#[derive(Debug)]
pub struct RoundRobin(pub replica::Committee);

impl LeaderRotation for RoundRobin {
    fn get_leader(&self, view: replica::ViewNumber) -> replica::ReplicaId {
        self.0.members()[view.0 as usize % self.0.len()]
    }
}
