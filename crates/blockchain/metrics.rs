//! Lock-free counters for the sampling pipeline.
//!
//! Every worker holds an `Arc<PipelineMetrics>` and bumps its own counters with
//! `Relaxed` ordering; the orchestrator reads a [`MetricsSnapshot`] after the run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Readings broadcast by the source.
    readings_emitted: AtomicU64,
    /// Analyzer inputs removed from the broadcast set after a failed send.
    sinks_dropped: AtomicU64,
    /// Stat records produced across all analyzers.
    stat_records: AtomicU64,
    /// Builder polls that expired without a record.
    poll_timeouts: AtomicU64,
    blocks_appended: AtomicU64,
    alert_blocks: AtomicU64,
    persist_failures: AtomicU64,
    /// Incomplete ticks evicted by the stale-tick horizon.
    stale_ticks_dropped: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_readings_emitted(&self) {
        self.readings_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sinks_dropped(&self) {
        self.sinks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stat_records(&self) {
        self.stat_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_poll_timeouts(&self) {
        self.poll_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocks_appended(&self, alert: bool) {
        self.blocks_appended.fetch_add(1, Ordering::Relaxed);
        if alert {
            self.alert_blocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_ticks_dropped(&self) {
        self.stale_ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy. Individual counters are exact; the set is not fenced.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings_emitted: self.readings_emitted.load(Ordering::Relaxed),
            sinks_dropped: self.sinks_dropped.load(Ordering::Relaxed),
            stat_records: self.stat_records.load(Ordering::Relaxed),
            poll_timeouts: self.poll_timeouts.load(Ordering::Relaxed),
            blocks_appended: self.blocks_appended.load(Ordering::Relaxed),
            alert_blocks: self.alert_blocks.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            stale_ticks_dropped: self.stale_ticks_dropped.load(Ordering::Relaxed),
        }
    }
}

const _: fn() = || {
    fn must_be_send_sync<T: Send + Sync>() {}
    must_be_send_sync::<PipelineMetrics>();
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub readings_emitted: u64,
    pub sinks_dropped: u64,
    pub stat_records: u64,
    pub poll_timeouts: u64,
    pub blocks_appended: u64,
    pub alert_blocks: u64,
    pub persist_failures: u64,
    pub stale_ticks_dropped: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Metrics")?;
        writeln!(f, "  readings_emitted:     {}", self.readings_emitted)?;
        writeln!(f, "  sinks_dropped:        {}", self.sinks_dropped)?;
        writeln!(f, "  stat_records:         {}", self.stat_records)?;
        writeln!(f, "  poll_timeouts:        {}", self.poll_timeouts)?;
        writeln!(f, "  blocks_appended:      {}", self.blocks_appended)?;
        writeln!(f, "  alert_blocks:         {}", self.alert_blocks)?;
        writeln!(f, "  persist_failures:     {}", self.persist_failures)?;
        write!(f, "  stale_ticks_dropped:  {}", self.stale_ticks_dropped)
    }
}
