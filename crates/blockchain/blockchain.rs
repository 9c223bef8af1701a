//! # biochain Blockchain
//!
//! Concurrent sampling pipeline that turns synthetic vital-sign readings into a
//! hash-linked, tamper-evident ledger.
//!
//! ## Overview
//!
//! This crate is responsible for:
//! - Emitting one reading per logical tick and broadcasting it to every channel
//! - Keeping a sliding window of statistics per channel
//! - Collecting one stat record per channel and tick into a block
//! - Evaluating medical thresholds against the raw reading of each tick
//! - Linking and persisting every block through [`biochain_storage::Store`]
//!
//! ## Key Components
//!
//! - [`SampleSource`]: producer of readings, fed by a [`ReadingGenerator`]
//! - [`ChannelAnalyzer`]: sliding-window statistics for one channel
//! - [`LedgerBuilder`]: fan-in, alert evaluation and block sealing
//! - [`Pipeline`]: wires the three stages on named threads
//!
//! ## Block Flow
//!
//! ```text
//! 1. Source emits reading for tick t to every analyzer
//! 2. Each analyzer updates its window and sends a stat record for t
//! 3. Builder groups records by t until one per channel has arrived
//! 4. Builder evaluates the alert on the raw reading
//! 5. Block is sealed onto the current head and the ledger is persisted
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use biochain_blockchain::{Pipeline, RandomVitals};
//! use biochain_storage::{EngineType, Store};
//!
//! let store = Store::new(&config.ledger_path, EngineType::JsonFile);
//! let summary = Pipeline::new(config, RandomVitals::new(None))?.run(store)?;
//! ```

pub mod analyzer;
pub mod builder;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod window;

pub use analyzer::{AnalyzerReport, ChannelAnalyzer};
pub use builder::{BuilderOutcome, LedgerBuilder, PendingTick, tick_alert};
pub use error::PipelineError;
pub use generator::{RandomVitals, ReadingGenerator, ScriptedReadings};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{Pipeline, PipelineSummary};
pub use source::{SampleSource, SourceReport};
pub use window::{SlidingWindow, WindowEntry};
