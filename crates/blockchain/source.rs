use std::{sync::Arc, thread, time::Duration};

use biochain_common::{Reading, Timestamp};
use crossbeam::channel::Sender;
use tracing::{debug, info, warn};

use crate::{error::PipelineError, generator::ReadingGenerator, metrics::PipelineMetrics};

/// Outcome of one source run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReport {
    pub emitted: u64,
    pub sinks_dropped: usize,
}

/// Emits one reading per logical tick and broadcasts it to every analyzer.
pub struct SampleSource<G> {
    generator: G,
    start_timestamp: Timestamp,
    pacing: Option<Duration>,
    metrics: Arc<PipelineMetrics>,
}

impl<G: ReadingGenerator> SampleSource<G> {
    pub fn new(generator: G, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            generator,
            start_timestamp: 0,
            pacing: None,
            metrics,
        }
    }

    pub fn with_start_timestamp(mut self, start_timestamp: Timestamp) -> Self {
        self.start_timestamp = start_timestamp;
        self
    }

    /// Sleep between readings. Logical timestamps are unaffected.
    pub fn with_pacing(mut self, pacing: Option<Duration>) -> Self {
        self.pacing = pacing;
        self
    }

    /// Broadcasts `count` readings spaced `interval` apart in logical time.
    ///
    /// A sink whose receiver is gone is dropped from the broadcast set and the run
    /// continues with the rest. The source stops early only when no sink is left.
    /// All sinks are dropped on return, which is how analyzers observe end-of-stream.
    pub fn run(&mut self, count: u64, interval: u64, outputs: Vec<Sender<Reading>>) -> SourceReport {
        let mut sinks: Vec<(usize, Sender<Reading>)> = outputs.into_iter().enumerate().collect();
        let initial_sinks = sinks.len();
        let mut emitted = 0;

        info!(count, interval, sinks = initial_sinks, "sample source started");

        for tick in 0..count {
            if sinks.is_empty() {
                warn!(emitted, "every sink closed, stopping source early");
                break;
            }

            let timestamp = self
                .start_timestamp
                .saturating_add(tick.saturating_mul(interval));
            let reading = self.generator.next_reading(timestamp);
            debug!(
                timestamp,
                heart_rate = reading.heart_rate,
                systolic = reading.blood_pressure.systolic,
                diastolic = reading.blood_pressure.diastolic,
                oxygen = reading.oxygen,
                "reading emitted"
            );

            sinks.retain(|(index, sink)| match sink.send(reading) {
                Ok(()) => true,
                Err(_) => {
                    let error = PipelineError::closed(format!("analyzer input #{index}"));
                    warn!(timestamp, error = %error, "dropping sink from broadcast set");
                    self.metrics.increment_sinks_dropped();
                    false
                }
            });

            emitted += 1;
            self.metrics.increment_readings_emitted();

            if let Some(pacing) = self.pacing {
                thread::sleep(pacing);
            }
        }

        let sinks_dropped = initial_sinks - sinks.len();
        drop(sinks);
        info!(emitted, sinks_dropped, "sample source finished");

        SourceReport {
            emitted,
            sinks_dropped,
        }
    }
}
