//! TOML-compatible configuration for the sampling pipeline.
//!
//! Every field has a default, so an empty file (or no file at all) yields the stock
//! 60-sample, 3-channel run:
//!
//! ```toml
//! sample_count = 60
//! window_duration = 30
//! channels = ["frecuencia", "presion", "oxigeno"]
//! ledger_path = "blockchain.json"
//!
//! [thresholds]
//! heart_rate_max = 200
//! systolic_max = 200
//! oxygen_min = 90
//! oxygen_max = 100
//! ```

use std::{fmt, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{Channel, Reading, Timestamp};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("at least one channel must be configured")]
    NoChannels,
    #[error("channel {0} is configured more than once")]
    DuplicateChannel(Channel),
    #[error("{0} must be > 0")]
    Zero(&'static str),
    #[error("thresholds.oxygen_min ({min}) must not exceed thresholds.oxygen_max ({max})")]
    InvertedOxygenRange { min: u32, max: u32 },
}

/// Medical limits checked against the raw reading of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Heart rate at or above this value raises an alert.
    pub heart_rate_max: u32,
    /// Systolic pressure at or above this value raises an alert.
    pub systolic_max: u32,
    /// Oxygen below this value raises an alert.
    pub oxygen_min: u32,
    /// Oxygen above this value raises an alert.
    pub oxygen_max: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heart_rate_max: 200,
            systolic_max: 200,
            oxygen_min: 90,
            oxygen_max: 100,
        }
    }
}

/// A single threshold violated by a raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    HeartRate(u32),
    Systolic(u32),
    Oxygen(u32),
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::HeartRate(bpm) => write!(f, "heart rate high ({bpm} bpm)"),
            Breach::Systolic(mmhg) => write!(f, "systolic pressure high ({mmhg} mmHg)"),
            Breach::Oxygen(pct) => write!(f, "oxygen out of range ({pct}%)"),
        }
    }
}

impl AlertThresholds {
    /// Every limit the reading violates, in a fixed order.
    pub fn breaches(&self, reading: &Reading) -> Vec<Breach> {
        let mut breaches = Vec::new();
        if reading.heart_rate >= self.heart_rate_max {
            breaches.push(Breach::HeartRate(reading.heart_rate));
        }
        if !(self.oxygen_min..=self.oxygen_max).contains(&reading.oxygen) {
            breaches.push(Breach::Oxygen(reading.oxygen));
        }
        if reading.blood_pressure.systolic >= self.systolic_max {
            breaches.push(Breach::Systolic(reading.blood_pressure.systolic));
        }
        breaches
    }
}

/// Settings consumed by the source, the analyzers and the ledger builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Readings emitted by the source; also the number of blocks the builder waits for.
    pub sample_count: u64,
    /// Logical time between consecutive readings.
    pub tick_interval: u64,
    /// Timestamp of the first reading.
    pub start_timestamp: Timestamp,
    /// Sliding window width, in logical time units.
    pub window_duration: u64,
    /// Analyzed channels. One analyzer is spawned per entry.
    pub channels: Vec<Channel>,
    pub thresholds: AlertThresholds,
    /// Bounded wait of the ledger builder on each analyzer output.
    pub poll_timeout_ms: u64,
    /// Capacity of each source-to-analyzer channel. `0` is a rendezvous hand-off.
    pub source_buffer: usize,
    /// Wall-clock pause after each reading. Does not affect logical timestamps.
    pub pacing_ms: u64,
    /// Drop pending ticks lagging the newest sealed block by more than this.
    /// Unset keeps incomplete ticks until shutdown.
    pub stale_tick_horizon: Option<u64>,
    pub ledger_path: PathBuf,
    /// Seed for the synthetic reading generator.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_count: 60,
            tick_interval: 1,
            start_timestamp: 0,
            window_duration: 30,
            channels: Channel::ALL.to_vec(),
            thresholds: AlertThresholds::default(),
            poll_timeout_ms: 5_000,
            source_buffer: 0,
            pacing_ms: 0,
            stale_tick_horizon: None,
            ledger_path: PathBuf::from("blockchain.json"),
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        debug!(path = %path.display(), ?config, "pipeline config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for (index, channel) in self.channels.iter().enumerate() {
            if self.channels.iter().skip(index + 1).any(|other| other == channel) {
                return Err(ConfigError::DuplicateChannel(*channel));
            }
        }
        if self.tick_interval == 0 {
            return Err(ConfigError::Zero("tick_interval"));
        }
        if self.window_duration == 0 {
            return Err(ConfigError::Zero("window_duration"));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Zero("poll_timeout_ms"));
        }
        if self.thresholds.oxygen_min > self.thresholds.oxygen_max {
            return Err(ConfigError::InvertedOxygenRange {
                min: self.thresholds.oxygen_min,
                max: self.thresholds.oxygen_max,
            });
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn pacing(&self) -> Option<Duration> {
        (self.pacing_ms > 0).then(|| Duration::from_millis(self.pacing_ms))
    }
}
