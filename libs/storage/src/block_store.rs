use std::{collections::HashMap, sync::Mutex};

use hotstuff_roles::replica;

/// Error returned by [`BlockStore::extends`] when the parent chain cannot be
/// walked because an intermediate block is absent from the store.
#[derive(Debug, thiserror::Error)]
#[error("missing block in the parent chain (block hash: {0:?})")]
pub struct MissingBlockError(pub replica::BlockHash);

/// In-memory content-addressed block store.
#[derive(Debug)]
pub struct BlockStore {
    genesis: replica::Block,
    blocks: Mutex<HashMap<replica::BlockHash, replica::Block>>,
}

impl BlockStore {
    /// Creates a new store containing only the given `genesis` block.
    pub fn new(genesis: replica::Block) -> Self {
        let blocks = Mutex::new([(genesis.hash(), genesis.clone())].into());
        Self { genesis, blocks }
    }

    /// The genesis block this store was bootstrapped with.
    pub fn genesis(&self) -> &replica::Block {
        &self.genesis
    }

    /// Stores a block. Idempotent: blocks are keyed by their content hash, so
    /// re-storing a block has no effect.
    pub fn store(&self, block: replica::Block) {
        self.blocks.lock().unwrap().insert(block.hash(), block);
    }

    /// Retrieves a block by hash.
    pub fn get(&self, hash: &replica::BlockHash) -> Option<replica::Block> {
        self.blocks.lock().unwrap().get(hash).cloned()
    }

    /// Whether a block with the given hash is present.
    pub fn contains(&self, hash: &replica::BlockHash) -> bool {
        self.blocks.lock().unwrap().contains_key(hash)
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    /// Returns `true` if the store is empty. Never true in practice, since
    /// genesis is pre-installed.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().unwrap().is_empty()
    }

    /// Walks the parent chain starting from `from` (which does not need to be
    /// stored itself) until it reaches a block with view ≤ `ancestor.view`,
    /// and reports whether that block is exactly `ancestor`. Fails if an
    /// intermediate parent is absent from the store.
    pub fn extends(
        &self,
        from: &replica::Block,
        ancestor: &replica::Block,
    ) -> Result<bool, MissingBlockError> {
        let mut block = from.clone();
        while block.view > ancestor.view {
            let parent_hash = block.parent_hash;
            block = self
                .get(&parent_hash)
                .ok_or(MissingBlockError(parent_hash))?;
        }
        Ok(block.hash() == ancestor.hash())
    }
}
