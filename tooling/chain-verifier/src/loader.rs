use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read ledger {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger must be a JSON array of blocks")]
    NotAnArray,
}

/// Reads the ledger file as a list of untyped block values.
pub fn load_ledger(path: impl AsRef<Path>) -> Result<Vec<Value>, LoadError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let blocks = parse_ledger(&raw)?;
    info!(path = %path.display(), blocks = blocks.len(), "ledger loaded");
    Ok(blocks)
}

pub fn parse_ledger(raw: &str) -> Result<Vec<Value>, LoadError> {
    match serde_json::from_str(raw)? {
        Value::Array(blocks) => Ok(blocks),
        _ => Err(LoadError::NotAnArray),
    }
}
