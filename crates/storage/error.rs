use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("in-memory backend lock poisoned")]
    LockPoisoned,
}
