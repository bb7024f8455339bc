//! Types used by a replica participating in the chained HotStuff protocol.
mod block;
mod cert;
mod consensus;
pub mod testonly;

pub use block::{Block, BlockHash, Command};
pub use cert::{AggregateSignature, PartialCert, QuorumCert, Signature, SyncInfo};
pub use consensus::{Committee, ReplicaId, ViewNumber};
