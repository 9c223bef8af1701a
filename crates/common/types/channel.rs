use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::Reading;

/// One analysed signal of a [`Reading`].
///
/// The serialized names are part of the persisted ledger format and must not change:
/// the verifier matches the `datos` keys of every block against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "frecuencia")]
    HeartRate,
    #[serde(rename = "presion")]
    BloodPressure,
    #[serde(rename = "oxigeno")]
    Oxygen,
}

impl Channel {
    /// Every known channel, in canonical (hashing) order.
    pub const ALL: [Channel; 3] = [Channel::HeartRate, Channel::BloodPressure, Channel::Oxygen];

    /// Key used for this channel inside a block's `datos` object.
    pub const fn key(self) -> &'static str {
        match self {
            Channel::HeartRate => "frecuencia",
            Channel::BloodPressure => "presion",
            Channel::Oxygen => "oxigeno",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.key() == key)
    }

    /// Scalar fed into this channel's sliding window.
    ///
    /// Blood pressure is tracked through its systolic component only.
    pub fn project(self, reading: &Reading) -> f64 {
        match self {
            Channel::HeartRate => f64::from(reading.heart_rate),
            Channel::BloodPressure => f64::from(reading.blood_pressure.systolic),
            Channel::Oxygen => f64::from(reading.oxygen),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let channel = match normalized.as_str() {
            "heart_rate" | "heart-rate" | "hr" => Some(Channel::HeartRate),
            "blood_pressure" | "blood-pressure" | "bp" => Some(Channel::BloodPressure),
            "oxygen" | "spo2" | "o2" => Some(Channel::Oxygen),
            other => Channel::from_key(other),
        };
        channel.ok_or_else(|| format!("unknown channel: {s}"))
    }
}
