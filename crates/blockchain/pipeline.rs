//! Wiring of the source, per-channel analyzers and the ledger builder.
//!
//! ```text
//!                   bounded(source_buffer)          unbounded
//! SampleSource ──┬──────────────────────► analyzer-frecuencia ──┐
//!                ├──────────────────────► analyzer-presion ─────┼──► ledger-builder ──► Store
//!                └──────────────────────► analyzer-oxigeno ─────┘
//! ```
//!
//! Every stage runs on its own named thread. Channels are the only shared state apart
//! from the atomic [`PipelineMetrics`].

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use biochain_common::{PipelineConfig, Timestamp};
use biochain_storage::Store;
use crossbeam::channel::{bounded, unbounded};
use tracing::{error, info};

use crate::{
    analyzer::{AnalyzerReport, ChannelAnalyzer},
    builder::LedgerBuilder,
    error::PipelineError,
    generator::ReadingGenerator,
    metrics::{MetricsSnapshot, PipelineMetrics},
    source::{SampleSource, SourceReport},
};

/// Everything a finished run reports back.
#[derive(Debug)]
pub struct PipelineSummary {
    pub store: Store,
    pub blocks_created: u64,
    pub incomplete_ticks: Vec<Timestamp>,
    /// `None` when the source thread panicked.
    pub source: Option<SourceReport>,
    /// One entry per analyzer that finished without panicking.
    pub analyzers: Vec<AnalyzerReport>,
    pub metrics: MetricsSnapshot,
}

impl PipelineSummary {
    /// Every configured tick became a block.
    pub fn is_complete(&self, expected_blocks: u64) -> bool {
        self.blocks_created == expected_blocks && self.incomplete_ticks.is_empty()
    }
}

pub struct Pipeline<G> {
    config: PipelineConfig,
    generator: G,
    metrics: Arc<PipelineMetrics>,
}

impl<G: ReadingGenerator + 'static> Pipeline<G> {
    /// Validates `config` up front; a pipeline never starts on a bad configuration.
    pub fn new(config: PipelineConfig, generator: G) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Shared counters, readable while [`Pipeline::run`] executes on another thread.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Runs the pipeline to completion, writing every sealed block to `store`.
    pub fn run(self, store: Store) -> Result<PipelineSummary, PipelineError> {
        let Self {
            config,
            generator,
            metrics,
        } = self;
        let expected = config.sample_count;

        info!(
            sample_count = expected,
            channels = ?config.channels,
            window = config.window_duration,
            "starting pipeline"
        );

        let mut reading_txs = Vec::with_capacity(config.channels.len());
        let mut record_rxs = Vec::with_capacity(config.channels.len());
        let mut analyzer_handles = Vec::with_capacity(config.channels.len());

        // Consumers start before the source.
        let builder = LedgerBuilder::new(
            config.channels.clone(),
            config.thresholds,
            store,
            metrics.clone(),
        )
        .with_poll_timeout(config.poll_timeout())
        .with_stale_tick_horizon(config.stale_tick_horizon);

        for &channel in &config.channels {
            let (reading_tx, reading_rx) = bounded(config.source_buffer);
            let (record_tx, record_rx) = unbounded();
            reading_txs.push(reading_tx);
            record_rxs.push(record_rx);

            let analyzer = ChannelAnalyzer::new(channel, config.window_duration, metrics.clone());
            let handle = spawn(format!("analyzer-{channel}"), move || {
                analyzer.run(reading_rx, record_tx, expected)
            })?;
            analyzer_handles.push((channel, handle));
        }

        let builder_handle = spawn("ledger-builder".to_owned(), move || {
            builder.run(record_rxs, expected)
        })?;

        let mut source = SampleSource::new(generator, metrics.clone())
            .with_start_timestamp(config.start_timestamp)
            .with_pacing(config.pacing());
        let interval = config.tick_interval;
        let source_handle = spawn("sample-source".to_owned(), move || {
            source.run(expected, interval, reading_txs)
        })?;

        let source_report = match source_handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("sample source panicked");
                None
            }
        };

        let mut analyzers = Vec::with_capacity(analyzer_handles.len());
        for (channel, handle) in analyzer_handles {
            match handle.join() {
                Ok(report) => analyzers.push(report),
                Err(_) => error!(%channel, "analyzer panicked"),
            }
        }

        let outcome = builder_handle
            .join()
            .map_err(|_| PipelineError::WorkerPanicked("ledger-builder".to_owned()))?;

        let metrics = metrics.snapshot();
        info!(
            blocks = outcome.blocks_created,
            alerts = metrics.alert_blocks,
            incomplete = outcome.incomplete_ticks.len(),
            "pipeline finished"
        );

        Ok(PipelineSummary {
            store: outcome.store,
            blocks_created: outcome.blocks_created,
            incomplete_ticks: outcome.incomplete_ticks,
            source: source_report,
            analyzers,
            metrics,
        })
    }
}

fn spawn<T, F>(name: String, work: F) -> Result<JoinHandle<T>, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(work)
        .map_err(|source| PipelineError::Spawn { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScriptedReadings;
    use biochain_common::{Channel, ConfigError};
    use biochain_storage::EngineType;

    fn config(sample_count: u64) -> PipelineConfig {
        PipelineConfig {
            sample_count,
            poll_timeout_ms: 200,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn invalid_config_never_starts() {
        let bad = PipelineConfig {
            channels: Vec::new(),
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(bad, ScriptedReadings::constant(80, 120, 80, 97));
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::NoChannels))
        ));
    }

    #[test]
    fn single_channel_pipeline_seals_one_block_per_tick() {
        let config = PipelineConfig {
            channels: vec![Channel::Oxygen],
            ..config(5)
        };
        let pipeline = Pipeline::new(config, ScriptedReadings::constant(80, 120, 80, 97)).unwrap();
        let summary = pipeline
            .run(Store::new("unused", EngineType::InMemory))
            .unwrap();

        assert!(summary.is_complete(5));
        assert_eq!(summary.analyzers.len(), 1);
        let blocks = summary.store.blocks();
        assert_eq!(blocks.len(), 5);
        assert!(blocks.iter().all(|block| block.datos.len() == 1));
    }

    #[test]
    fn zero_buffer_rendezvous_completes() {
        let config = PipelineConfig {
            source_buffer: 0,
            ..config(10)
        };
        let summary = Pipeline::new(config, ScriptedReadings::constant(80, 120, 80, 97))
            .unwrap()
            .run(Store::new("unused", EngineType::InMemory))
            .unwrap();

        assert_eq!(summary.blocks_created, 10);
        assert_eq!(summary.metrics.readings_emitted, 10);
        assert_eq!(summary.metrics.stat_records, 30);
        assert_eq!(summary.source.map(|report| report.emitted), Some(10));
    }
}
