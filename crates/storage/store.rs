//! # biochain Storage
//!
//! Append-only ledger store used by the ledger builder.
//!
//! The [`Store`] keeps the chain in memory and mirrors it to a [`LedgerBackend`] after
//! every append. Only the ledger builder owns a `Store`; nothing else reads or writes
//! the chain while the pipeline runs.
//!
//! ```ignore
//! use biochain_storage::{EngineType, Store};
//!
//! let mut store = Store::new("blockchain.json", EngineType::JsonFile);
//! store.append(block)?;
//! ```

pub mod api;
pub mod backend;
pub mod error;

use std::path::Path;

use biochain_common::Block;
use tracing::debug;

pub use api::LedgerBackend;
pub use backend::{in_memory::InMemoryBackend, json_file::JsonFileBackend};
pub use error::StoreError;

/// Storage backend type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    /// In-memory storage, non-persistent. Suitable for testing.
    InMemory,
    /// Whole-file JSON rewrite on every append.
    JsonFile,
}

#[derive(Debug)]
pub struct Store {
    backend: Box<dyn LedgerBackend>,
    chain: Vec<Block>,
}

impl Store {
    /// Opens an empty ledger. An existing file at `path` is overwritten on first append.
    pub fn new(path: impl AsRef<Path>, engine_type: EngineType) -> Self {
        match engine_type {
            EngineType::InMemory => Self::from_backend(Box::new(InMemoryBackend::open())),
            EngineType::JsonFile => Self::from_backend(Box::new(JsonFileBackend::open(path))),
        }
    }

    pub fn from_backend(backend: Box<dyn LedgerBackend>) -> Self {
        debug!(?backend, "initializing ledger store");
        Self {
            backend,
            chain: Vec::new(),
        }
    }

    /// Hash the next block must link to: the head's hash, or `""` for genesis.
    pub fn head_hash(&self) -> &str {
        self.chain.last().map(|block| block.hash.as_str()).unwrap_or("")
    }

    /// Appends `block` and rewrites the backing store.
    ///
    /// The block stays in the in-memory chain even if persisting fails, so the chain
    /// keeps growing consistently and the next successful write catches the file up.
    pub fn append(&mut self, block: Block) -> Result<(), StoreError> {
        self.chain.push(block);
        self.backend.write_all(&self.chain)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Reads the ledger back from the backend, bypassing the in-memory copy.
    pub fn load_persisted(&self) -> Result<Vec<Block>, StoreError> {
        self.backend.read_all()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.chain
    }
}
