//! Random generation of protocol types for tests.
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use super::{
    AggregateSignature, Block, BlockHash, Command, PartialCert, QuorumCert, ReplicaId, Signature,
    SyncInfo, ViewNumber,
};

impl Distribution<ViewNumber> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ViewNumber {
        ViewNumber(rng.gen())
    }
}

impl Distribution<ReplicaId> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ReplicaId {
        ReplicaId(rng.gen())
    }
}

impl Distribution<BlockHash> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> BlockHash {
        BlockHash(rng.gen())
    }
}

impl Distribution<Command> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Command {
        let size: usize = rng.gen_range(0..32);
        Command((0..size).map(|_| rng.gen()).collect())
    }
}

impl Distribution<Signature> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Signature {
        Signature(rng.gen::<[u8; 32]>().to_vec())
    }
}

impl Distribution<AggregateSignature> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> AggregateSignature {
        AggregateSignature(rng.gen::<[u8; 32]>().to_vec())
    }
}

impl Distribution<PartialCert> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PartialCert {
        PartialCert {
            signer: rng.gen(),
            block_hash: rng.gen(),
            view: rng.gen(),
            signature: rng.gen(),
        }
    }
}

impl Distribution<QuorumCert> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> QuorumCert {
        let n = rng.gen_range(1..8);
        QuorumCert {
            block_hash: rng.gen(),
            view: rng.gen(),
            signers: (0..n).map(ReplicaId).collect(),
            signature: rng.gen(),
        }
    }
}

impl Distribution<Block> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block {
            parent_hash: rng.gen(),
            justification: Some(rng.gen()),
            view: rng.gen(),
            proposer: rng.gen(),
            command: rng.gen(),
        }
    }
}

impl Distribution<SyncInfo> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SyncInfo {
        SyncInfo { qc: rng.gen() }
    }
}
