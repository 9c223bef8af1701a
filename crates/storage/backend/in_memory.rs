use std::sync::{Arc, RwLock};

use biochain_common::Block;

use crate::{api::LedgerBackend, error::StoreError};

/// Non-persistent backend. Clones share the same underlying ledger, which lets a
/// test keep a handle while the pipeline owns the store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    blocks: Arc<RwLock<Vec<Block>>>,
    writes: Arc<RwLock<u64>>,
}

impl InMemoryBackend {
    pub fn open() -> Self {
        Self::default()
    }

    /// Number of full-ledger rewrites performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.read().map(|count| *count).unwrap_or_default()
    }
}

impl LedgerBackend for InMemoryBackend {
    fn write_all(&mut self, blocks: &[Block]) -> Result<(), StoreError> {
        let mut stored = self.blocks.write().map_err(|_| StoreError::LockPoisoned)?;
        *stored = blocks.to_vec();
        let mut writes = self.writes.write().map_err(|_| StoreError::LockPoisoned)?;
        *writes += 1;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Block>, StoreError> {
        let stored = self.blocks.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(stored.clone())
    }
}
