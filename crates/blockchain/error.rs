use std::time::Duration;

use biochain_common::{Channel, ConfigError, Timestamp};
use biochain_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The peer on the other end of a channel is gone. Ends only that branch.
    #[error("{component} transport closed")]
    TransportClosed { component: String },

    #[error("no stat record from {channel} within {timeout:?}")]
    PollTimeout { channel: Channel, timeout: Duration },

    #[error("tick {timestamp} completed without an original reading")]
    MissingOriginalData { timestamp: Timestamp },

    #[error("failed to persist ledger: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("{0} worker panicked")]
    WorkerPanicked(String),
}

impl PipelineError {
    pub(crate) fn closed(component: impl Into<String>) -> Self {
        Self::TransportClosed {
            component: component.into(),
        }
    }
}
