//! Shared protocol types of the chained HotStuff consensus: views, replicas,
//! blocks and certificates. The consensus component (`hotstuff-bft`) and the
//! block store (`hotstuff-storage`) are both built on top of these types.
pub mod replica;
