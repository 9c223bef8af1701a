//! Backend abstraction for ledger persistence.

use std::fmt::Debug;

use biochain_common::Block;

use crate::error::StoreError;

/// Durable home of the ledger. Every append rewrites the whole sequence.
pub trait LedgerBackend: Debug + Send {
    /// Replaces the persisted ledger with `blocks`.
    fn write_all(&mut self, blocks: &[Block]) -> Result<(), StoreError>;

    /// Reads back the persisted ledger.
    fn read_all(&self) -> Result<Vec<Block>, StoreError>;
}
