use std::sync::Arc;

use biochain_common::{Channel, ChannelStats, Reading, StatRecord};
use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::{error::PipelineError, metrics::PipelineMetrics, window::SlidingWindow};

/// How an analyzer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerReport {
    pub channel: Channel,
    pub processed: u64,
    /// `false` when the input closed or the output was dropped before `expected_count`.
    pub completed: bool,
}

/// Stateful per-channel worker: one sliding window, one stat record per reading.
#[derive(Debug)]
pub struct ChannelAnalyzer {
    channel: Channel,
    window: SlidingWindow,
    metrics: Arc<PipelineMetrics>,
}

impl ChannelAnalyzer {
    pub fn new(channel: Channel, window_duration: u64, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            channel,
            window: SlidingWindow::new(window_duration),
            metrics,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Folds one reading into the window and returns the resulting statistics.
    pub fn process(&mut self, reading: &Reading) -> StatRecord {
        self.window
            .push(reading.timestamp, self.channel.project(reading));
        let stats = self.window.stats();

        debug!(
            channel = %self.channel,
            timestamp = reading.timestamp,
            window = self.window.len(),
            mean = stats.mean,
            stddev = stats.stddev,
            "window updated"
        );

        StatRecord {
            channel: self.channel,
            timestamp: reading.timestamp,
            stats: ChannelStats {
                mean: round2(stats.mean),
                stddev: round2(stats.stddev),
            },
            original: Some(*reading),
        }
    }

    /// Consumes readings until `expected_count` have been processed or the input closes.
    ///
    /// End-of-stream before `expected_count` is a graceful shutdown, not an error. A closed
    /// output ends this analyzer only.
    pub fn run(
        mut self,
        input: Receiver<Reading>,
        output: Sender<StatRecord>,
        expected_count: u64,
    ) -> AnalyzerReport {
        info!(channel = %self.channel, expected_count, "analyzer started");
        let mut processed = 0;

        while processed < expected_count {
            let Ok(reading) = input.recv() else {
                info!(channel = %self.channel, processed, "input closed, analyzer shutting down");
                break;
            };

            let record = self.process(&reading);
            processed += 1;

            if output.send(record).is_err() {
                let error = PipelineError::closed(format!("{} stat output", self.channel));
                warn!(channel = %self.channel, processed, error = %error, "analyzer terminating early");
                break;
            }
            self.metrics.increment_stat_records();
        }

        let completed = processed == expected_count;
        info!(channel = %self.channel, processed, completed, "analyzer finished");

        AnalyzerReport {
            channel: self.channel,
            processed,
            completed,
        }
    }
}

/// Rounds to two decimals, the precision persisted in the ledger.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
