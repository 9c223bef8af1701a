use std::{
    fs,
    path::{Path, PathBuf},
};

use biochain_common::Block;
use tracing::debug;

use crate::{api::LedgerBackend, error::StoreError};

/// Persists the ledger as a pretty-printed JSON array.
///
/// Each write goes to a sibling temporary file which is then renamed over the target,
/// so a reader never observes a half-written ledger.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerBackend for JsonFileBackend {
    fn write_all(&mut self, blocks: &[Block]) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(blocks)?;
        let temp_path = self.temp_path();

        fs::write(&temp_path, serialized).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), blocks = blocks.len(), "ledger persisted");
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Block>, StoreError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}
