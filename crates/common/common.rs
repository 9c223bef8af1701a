//! Shared domain types for the biochain workspace.
//!
//! Everything that crosses a crate boundary lives here: the per-tick [`types::Reading`],
//! the per-channel [`types::StatRecord`] emitted by analyzers, the hash-linked
//! [`types::Block`] and the [`config::PipelineConfig`] consumed by the pipeline.

pub mod config;
pub mod types;

pub use config::{AlertThresholds, Breach, ConfigError, PipelineConfig};
pub use types::{
    Block, BlockHash, BloodPressure, Channel, ChannelStats, Datos, Reading, StatRecord,
    Timestamp,
};
