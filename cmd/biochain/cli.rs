use std::{fmt::Display, path::PathBuf, str::FromStr};

use biochain_common::{Channel, ConfigError, PipelineConfig};
use clap::Parser as ClapParser;
use tracing::Level;

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser, Debug)]
#[command(name = "biochain", version, about = "Biometric sampling pipeline with a hash-linked ledger")]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

/// Every flag except the log options overrides the matching field of the config file.
#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "config",
        value_name = "CONFIG_FILE",
        help = "TOML pipeline configuration. Defaults apply to every missing key.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_CONFIG"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long = "samples",
        value_name = "COUNT",
        help = "Number of readings to emit; one block is produced per reading.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_SAMPLES"
    )]
    pub samples: Option<u64>,
    #[arg(
        long = "interval",
        value_name = "TICKS",
        help = "Logical time between consecutive readings.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_INTERVAL"
    )]
    pub interval: Option<u64>,
    #[arg(
        long = "window",
        value_name = "TICKS",
        help = "Sliding window width in logical time units.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_WINDOW"
    )]
    pub window: Option<u64>,
    #[arg(
        long = "channels",
        value_name = "CHANNEL_LIST",
        value_delimiter = ',',
        num_args = 1..,
        help = "Comma separated channels to analyze.",
        long_help = "Possible values: frecuencia, presion, oxigeno (aliases: hr, bp, spo2)",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_CHANNELS"
    )]
    pub channels: Option<Vec<Channel>>,
    #[arg(
        long = "poll-timeout-ms",
        value_name = "MILLIS",
        help = "Bounded wait of the ledger builder on each analyzer.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_POLL_TIMEOUT_MS"
    )]
    pub poll_timeout_ms: Option<u64>,
    #[arg(
        long = "source-buffer",
        value_name = "CAPACITY",
        help = "Capacity of each source-to-analyzer channel. 0 is a rendezvous hand-off.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_SOURCE_BUFFER"
    )]
    pub source_buffer: Option<usize>,
    #[arg(
        long = "pacing-ms",
        value_name = "MILLIS",
        help = "Wall-clock pause after each reading.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_PACING_MS"
    )]
    pub pacing_ms: Option<u64>,
    #[arg(
        long = "stale-tick-horizon",
        value_name = "TICKS",
        help = "Drop incomplete ticks lagging the newest block by more than this.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_STALE_TICK_HORIZON"
    )]
    pub stale_tick_horizon: Option<u64>,
    #[arg(
        long = "seed",
        value_name = "SEED",
        help = "Seed for reproducible synthetic readings.",
        help_heading = "Pipeline options",
        env = "BIOCHAIN_SEED"
    )]
    pub seed: Option<u64>,
    #[arg(
        long = "ledger",
        value_name = "LEDGER_FILE",
        help = "Where the ledger is persisted.",
        long_help = "If the path is the word `memory`, the ledger is kept in memory only.",
        help_heading = "Storage options",
        env = "BIOCHAIN_LEDGER"
    )]
    pub ledger: Option<PathBuf>,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "BIOCHAIN_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error",
        help_heading = "Log options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        help_heading = "Log options",
        env = "BIOCHAIN_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

impl Options {
    /// Config file (or defaults) with every given flag applied on top, validated.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(samples) = self.samples {
            config.sample_count = samples;
        }
        if let Some(interval) = self.interval {
            config.tick_interval = interval;
        }
        if let Some(window) = self.window {
            config.window_duration = window;
        }
        if let Some(channels) = &self.channels {
            config.channels = channels.clone();
        }
        if let Some(poll_timeout_ms) = self.poll_timeout_ms {
            config.poll_timeout_ms = poll_timeout_ms;
        }
        if let Some(source_buffer) = self.source_buffer {
            config.source_buffer = source_buffer;
        }
        if let Some(pacing_ms) = self.pacing_ms {
            config.pacing_ms = pacing_ms;
        }
        if self.stale_tick_horizon.is_some() {
            config.stale_tick_horizon = self.stale_tick_horizon;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(ledger) = &self.ledger {
            config.ledger_path = ledger.clone();
        }
        config
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{s}'. Expected: auto, always, or never"
            )),
        }
    }
}
