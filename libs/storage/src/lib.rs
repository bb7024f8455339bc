//! Block storage for the chained HotStuff consensus. The store is a
//! thread-safe, content-addressed map from block hash to block with the
//! genesis block pre-installed. Blocks are immutable; storing the same block
//! twice is a no-op.
mod block_store;

pub use block_store::{BlockStore, MissingBlockError};
