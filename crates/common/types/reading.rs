use serde::{Deserialize, Serialize};

use super::{Channel, ChannelStats, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

/// One multi-channel sample taken at a logical tick.
///
/// `Reading` is `Copy`: the source hands every analyzer its own value, nothing is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: Timestamp,
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    pub oxygen: u32,
}

/// Statistics computed by one channel analyzer for one reading.
///
/// The original reading travels along so the ledger builder can run threshold checks
/// on raw values instead of the smoothed mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub channel: Channel,
    pub timestamp: Timestamp,
    pub stats: ChannelStats,
    pub original: Option<Reading>,
}
