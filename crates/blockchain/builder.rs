//! Fan-in of per-channel stat records into hash-linked blocks.
//!
//! Records are grouped per logical timestamp in a [`PendingTick`]: a fixed slot array
//! indexed by the channel's position in the configured channel list. The instant a tick
//! holds one record per channel it is removed, sealed into a [`Block`] linked to the
//! current head, and the whole ledger is persisted.
//!
//! A tick that never completes stays pending. With `stale_tick_horizon` set, pending
//! ticks that lag the newest sealed block by more than the horizon are dropped.

use std::{sync::Arc, time::Duration};

use biochain_common::{AlertThresholds, Block, Channel, Datos, StatRecord, Timestamp};
use biochain_storage::Store;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::{error::PipelineError, metrics::PipelineMetrics};

/// Records collected so far for one timestamp.
#[derive(Debug, Clone)]
pub struct PendingTick {
    slots: Vec<Option<StatRecord>>,
    filled: usize,
}

impl PendingTick {
    pub fn new(channel_count: usize) -> Self {
        Self {
            slots: vec![None; channel_count],
            filled: 0,
        }
    }

    /// Stores `record` in `slot`. Returns `false` if the slot is out of range or
    /// already taken; the first record for a slot wins.
    pub fn insert(&mut self, slot: usize, record: StatRecord) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(record);
                self.filled += 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn into_records(self) -> Vec<StatRecord> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Alert flag of a completed tick.
///
/// Checked against the raw reading embedded in the records, never against the rolling
/// mean, so a single spike is not averaged away. A tick without any embedded reading is
/// flagged.
pub fn tick_alert(timestamp: Timestamp, records: &[StatRecord], thresholds: &AlertThresholds) -> bool {
    let Some(reading) = records.iter().find_map(|record| record.original) else {
        let error = PipelineError::MissingOriginalData { timestamp };
        warn!(timestamp, error = %error, "flagging tick as alert");
        return true;
    };

    let breaches = thresholds.breaches(&reading);
    for breach in &breaches {
        warn!(timestamp, %breach, "medical threshold breached");
    }
    !breaches.is_empty()
}

#[derive(Debug)]
pub struct BuilderOutcome {
    pub store: Store,
    pub blocks_created: u64,
    /// Timestamps of ticks still incomplete at shutdown, ascending.
    pub incomplete_ticks: Vec<Timestamp>,
}

/// Sole owner and writer of the ledger while the pipeline runs.
#[derive(Debug)]
pub struct LedgerBuilder {
    channels: Vec<Channel>,
    thresholds: AlertThresholds,
    poll_timeout: Duration,
    stale_tick_horizon: Option<u64>,
    store: Store,
    pending: FxHashMap<Timestamp, PendingTick>,
    metrics: Arc<PipelineMetrics>,
}

impl LedgerBuilder {
    pub fn new(
        channels: Vec<Channel>,
        thresholds: AlertThresholds,
        store: Store,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            channels,
            thresholds,
            poll_timeout: Duration::from_secs(5),
            stale_tick_horizon: None,
            store,
            pending: FxHashMap::default(),
            metrics,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_stale_tick_horizon(mut self, horizon: Option<u64>) -> Self {
        self.stale_tick_horizon = horizon;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn pending_ticks(&self) -> usize {
        self.pending.len()
    }

    /// Folds one record into its tick. Returns `true` when the record completed the
    /// tick and a block was appended.
    pub fn ingest(&mut self, record: StatRecord) -> bool {
        let Some(slot) = self.channels.iter().position(|channel| *channel == record.channel) else {
            warn!(channel = %record.channel, timestamp = record.timestamp, "record for unconfigured channel ignored");
            return false;
        };

        let timestamp = record.timestamp;
        let channel = record.channel;
        let channel_count = self.channels.len();
        let tick = self
            .pending
            .entry(timestamp)
            .or_insert_with(|| PendingTick::new(channel_count));

        if !tick.insert(slot, record) {
            warn!(%channel, timestamp, "duplicate record for tick ignored");
            return false;
        }
        debug!(%channel, timestamp, filled = tick.filled(), "record folded into tick");

        if !tick.is_complete() {
            return false;
        }
        let Some(tick) = self.pending.remove(&timestamp) else {
            return false;
        };

        self.seal(timestamp, tick.into_records());
        self.evict_stale(timestamp);
        true
    }

    fn seal(&mut self, timestamp: Timestamp, records: Vec<StatRecord>) {
        let prev_hash = self.store.head_hash().to_owned();
        let alert = tick_alert(timestamp, &records, &self.thresholds);
        let datos: Datos = records
            .into_iter()
            .map(|record| (record.channel, record.stats))
            .collect();

        let block = Block::seal(timestamp, datos, alert, prev_hash);
        let number = self.store.len();
        let short_hash = block.short_hash().to_owned();

        self.metrics.increment_blocks_appended(alert);
        if let Err(store_error) = self.store.append(block) {
            self.metrics.increment_persist_failures();
            let error = PipelineError::Persistence(store_error);
            error!(number, timestamp, error = %error, "ledger kept in memory only");
        }

        info!(number, timestamp, hash = %short_hash, alert, "block appended");
    }

    fn evict_stale(&mut self, sealed: Timestamp) {
        let Some(horizon) = self.stale_tick_horizon else {
            return;
        };
        let metrics = &self.metrics;
        self.pending.retain(|timestamp, tick| {
            let stale = sealed.saturating_sub(*timestamp) > horizon;
            if stale {
                warn!(
                    timestamp = *timestamp,
                    filled = tick.filled(),
                    sealed,
                    "dropping stale incomplete tick"
                );
                metrics.increment_stale_ticks_dropped();
            }
            !stale
        });
    }

    /// Polls `inputs` round-robin until `expected_blocks` blocks exist.
    ///
    /// `inputs[i]` is expected to carry the records of the i-th configured channel; it is
    /// only used to label timeouts, records are routed by their own channel. A poll that
    /// times out is retried on the next round. The loop also ends once every input has
    /// closed, leaving whatever ticks are still incomplete.
    pub fn run(mut self, inputs: Vec<Receiver<StatRecord>>, expected_blocks: u64) -> BuilderOutcome {
        info!(
            channels = self.channels.len(),
            expected_blocks,
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "ledger builder started"
        );

        let mut open: Vec<Option<Receiver<StatRecord>>> = inputs.into_iter().map(Some).collect();
        let mut blocks_created = 0;

        'outer: while blocks_created < expected_blocks {
            if open.iter().all(Option::is_none) {
                warn!(blocks_created, expected_blocks, "every analyzer output closed");
                break;
            }

            for (index, slot) in open.iter_mut().enumerate() {
                let Some(input) = slot.as_ref() else {
                    continue;
                };
                match input.recv_timeout(self.poll_timeout) {
                    Ok(record) => {
                        if self.ingest(record) {
                            blocks_created += 1;
                            if blocks_created >= expected_blocks {
                                break 'outer;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        self.metrics.increment_poll_timeouts();
                        if let Some(channel) = self.channels.get(index) {
                            let error = PipelineError::PollTimeout {
                                channel: *channel,
                                timeout: self.poll_timeout,
                            };
                            debug!(error = %error, "poll timed out, retrying");
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!(input = index, "analyzer output closed");
                        *slot = None;
                    }
                }
            }
        }

        let mut incomplete_ticks: Vec<Timestamp> = self.pending.keys().copied().collect();
        incomplete_ticks.sort_unstable();
        if !incomplete_ticks.is_empty() {
            warn!(count = incomplete_ticks.len(), "shutting down with incomplete ticks");
        }
        info!(blocks_created, "ledger builder finished");

        BuilderOutcome {
            store: self.store,
            blocks_created,
            incomplete_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biochain_common::{BloodPressure, ChannelStats, Reading};
    use biochain_storage::{EngineType, InMemoryBackend, LedgerBackend};
    use crossbeam::channel::unbounded;

    fn reading(timestamp: Timestamp, heart_rate: u32, systolic: u32, oxygen: u32) -> Reading {
        Reading {
            timestamp,
            heart_rate,
            blood_pressure: BloodPressure {
                systolic,
                diastolic: 80,
            },
            oxygen,
        }
    }

    fn record(channel: Channel, timestamp: Timestamp, mean: f64, original: Option<Reading>) -> StatRecord {
        StatRecord {
            channel,
            timestamp,
            stats: ChannelStats { mean, stddev: 0.5 },
            original,
        }
    }

    fn normal_records(timestamp: Timestamp) -> Vec<StatRecord> {
        let raw = reading(timestamp, 80, 120, 97);
        vec![
            record(Channel::HeartRate, timestamp, 80.0, Some(raw)),
            record(Channel::BloodPressure, timestamp, 120.0, Some(raw)),
            record(Channel::Oxygen, timestamp, 97.0, Some(raw)),
        ]
    }

    fn builder() -> LedgerBuilder {
        LedgerBuilder::new(
            Channel::ALL.to_vec(),
            AlertThresholds::default(),
            Store::new("unused", EngineType::InMemory),
            Arc::new(PipelineMetrics::new()),
        )
    }

    #[test]
    fn pending_tick_completes_at_full_cardinality() {
        let mut tick = PendingTick::new(3);
        let records = normal_records(0);

        assert!(tick.insert(0, records[0].clone()));
        assert!(!tick.insert(0, records[0].clone()));
        assert!(!tick.insert(7, records[1].clone()));
        assert!(tick.insert(2, records[2].clone()));
        assert!(!tick.is_complete());
        assert!(tick.insert(1, records[1].clone()));
        assert!(tick.is_complete());
        assert_eq!(tick.into_records().len(), 3);
    }

    #[test]
    fn interleaved_ticks_seal_in_completion_order() {
        let mut builder = builder();
        let first = normal_records(1);
        let second = normal_records(2);

        assert!(!builder.ingest(second[2].clone()));
        assert!(!builder.ingest(first[0].clone()));
        assert!(!builder.ingest(second[0].clone()));
        assert!(!builder.ingest(first[1].clone()));
        assert_eq!(builder.pending_ticks(), 2);
        assert!(builder.ingest(second[1].clone()));
        assert_eq!(builder.pending_ticks(), 1);
        assert!(builder.ingest(first[2].clone()));
        assert_eq!(builder.pending_ticks(), 0);

        let blocks = builder.store().blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].timestamp, 2);
        assert_eq!(blocks[0].prev_hash, "");
        assert_eq!(blocks[1].timestamp, 1);
        assert_eq!(blocks[1].prev_hash, blocks[0].hash);
        for block in blocks {
            assert_eq!(block.compute_hash(), block.hash);
            assert_eq!(block.datos.len(), 3);
            assert!(!block.alert);
        }
    }

    #[test]
    fn alert_uses_raw_reading_not_the_mean() {
        let mut builder = builder();
        let spike = reading(5, 230, 120, 97);
        // Smoothed means look perfectly normal.
        for channel in Channel::ALL {
            builder.ingest(record(channel, 5, 90.0, Some(spike)));
        }

        let block = &builder.store().blocks()[0];
        assert!(block.alert);
        assert_eq!(
            block.datos.get(Channel::HeartRate),
            Some(&ChannelStats {
                mean: 90.0,
                stddev: 0.5
            })
        );
    }

    #[test]
    fn tick_alert_covers_every_threshold() {
        let thresholds = AlertThresholds::default();
        let alert_for = |raw: Reading| {
            tick_alert(0, &[record(Channel::Oxygen, 0, 95.0, Some(raw))], &thresholds)
        };

        assert!(!alert_for(reading(0, 199, 199, 90)));
        assert!(alert_for(reading(0, 200, 120, 97)));
        assert!(alert_for(reading(0, 80, 200, 97)));
        assert!(alert_for(reading(0, 80, 120, 89)));
        assert!(alert_for(reading(0, 80, 120, 101)));
    }

    #[test]
    fn missing_original_reading_is_flagged() {
        let records = vec![
            record(Channel::HeartRate, 3, 80.0, None),
            record(Channel::Oxygen, 3, 97.0, None),
        ];
        assert!(tick_alert(3, &records, &AlertThresholds::default()));

        let mut with_one = records;
        with_one.push(record(Channel::BloodPressure, 3, 120.0, Some(reading(3, 80, 120, 97))));
        assert!(!tick_alert(3, &with_one, &AlertThresholds::default()));
    }

    #[test]
    fn records_for_unconfigured_channels_are_ignored() {
        let mut builder = LedgerBuilder::new(
            vec![Channel::HeartRate],
            AlertThresholds::default(),
            Store::new("unused", EngineType::InMemory),
            Arc::new(PipelineMetrics::new()),
        );
        let records = normal_records(0);

        assert!(!builder.ingest(records[1].clone()));
        assert_eq!(builder.pending_ticks(), 0);
        assert!(builder.ingest(records[0].clone()));
        assert_eq!(builder.store().blocks()[0].datos.len(), 1);
    }

    #[test]
    fn stale_horizon_drops_lagging_ticks() {
        let metrics = Arc::new(PipelineMetrics::new());
        let mut builder = LedgerBuilder::new(
            Channel::ALL.to_vec(),
            AlertThresholds::default(),
            Store::new("unused", EngineType::InMemory),
            metrics.clone(),
        )
        .with_stale_tick_horizon(Some(2));

        // Tick 0 never completes.
        builder.ingest(normal_records(0)[0].clone());
        for timestamp in 1..=2 {
            for record in normal_records(timestamp) {
                builder.ingest(record);
            }
        }
        assert_eq!(builder.pending_ticks(), 1);

        for record in normal_records(3) {
            builder.ingest(record);
        }
        assert_eq!(builder.pending_ticks(), 0);
        assert_eq!(metrics.snapshot().stale_ticks_dropped, 1);
    }

    #[test]
    fn incomplete_ticks_are_kept_without_horizon() {
        let mut builder = builder();
        builder.ingest(normal_records(0)[0].clone());
        for timestamp in 1..100 {
            for record in normal_records(timestamp) {
                builder.ingest(record);
            }
        }
        assert_eq!(builder.pending_ticks(), 1);
    }

    #[test]
    fn run_builds_expected_blocks_from_channel_inputs() {
        let backend = InMemoryBackend::open();
        let metrics = Arc::new(PipelineMetrics::new());
        let builder = LedgerBuilder::new(
            Channel::ALL.to_vec(),
            AlertThresholds::default(),
            Store::from_backend(Box::new(backend.clone())),
            metrics.clone(),
        )
        .with_poll_timeout(Duration::from_millis(20));

        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for _ in Channel::ALL {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        for timestamp in 0..4 {
            for (sender, record) in senders.iter().zip(normal_records(timestamp)) {
                sender.send(record).unwrap();
            }
        }
        drop(senders);

        let outcome = builder.run(receivers, 4);

        assert_eq!(outcome.blocks_created, 4);
        assert!(outcome.incomplete_ticks.is_empty());
        assert_eq!(backend.read_all().unwrap(), outcome.store.blocks());
        assert_eq!(metrics.snapshot().blocks_appended, 4);
    }

    #[test]
    fn run_survives_a_dead_analyzer_and_reports_incomplete_ticks() {
        let builder = builder().with_poll_timeout(Duration::from_millis(10));
        let (hr_tx, hr_rx) = unbounded();
        let (bp_tx, bp_rx) = unbounded();
        let (o2_tx, o2_rx) = unbounded::<StatRecord>();

        for timestamp in 0..3 {
            let records = normal_records(timestamp);
            hr_tx.send(records[0].clone()).unwrap();
            bp_tx.send(records[1].clone()).unwrap();
        }
        drop(o2_tx);
        drop(hr_tx);
        drop(bp_tx);

        let outcome = builder.run(vec![hr_rx, bp_rx, o2_rx], 3);

        assert_eq!(outcome.blocks_created, 0);
        assert_eq!(outcome.incomplete_ticks, vec![0, 1, 2]);
    }

    #[test]
    fn poll_timeouts_are_retried() {
        let metrics = Arc::new(PipelineMetrics::new());
        let builder = LedgerBuilder::new(
            vec![Channel::HeartRate],
            AlertThresholds::default(),
            Store::new("unused", EngineType::InMemory),
            metrics.clone(),
        )
        .with_poll_timeout(Duration::from_millis(5));
        let (tx, rx) = unbounded();

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            tx.send(normal_records(0)[0].clone()).unwrap();
        });

        let outcome = builder.run(vec![rx], 1);
        producer.join().unwrap();

        assert_eq!(outcome.blocks_created, 1);
        assert!(metrics.snapshot().poll_timeouts >= 1);
    }
}
