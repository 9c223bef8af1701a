use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Channel, Timestamp};

/// Hex-encoded SHA-256 digest. The genesis link is the empty string.
pub type BlockHash = String;

/// Length of the hash prefix shown in logs and reports.
pub const SHORT_HASH_LEN: usize = 16;

/// Rolling statistics for one channel, as persisted in a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    #[serde(rename = "media")]
    pub mean: f64,
    #[serde(rename = "desv")]
    pub stddev: f64,
}

/// Per-channel statistics of a block, keyed and ordered by [`Channel`].
///
/// The ordering is what makes [`Datos::canonical_string`] independent of the order in
/// which analyzers reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datos(BTreeMap<Channel, ChannelStats>);

impl Datos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel, stats: ChannelStats) -> Option<ChannelStats> {
        self.0.insert(channel, stats)
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelStats> {
        self.0.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Channel, ChannelStats> {
        self.0.iter()
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.keys().copied()
    }

    /// Byte-stable rendering used as hash input.
    ///
    /// Channels appear in canonical order and numbers use Rust's shortest round-trip
    /// float formatting, so any `f64` read back from the persisted JSON renders exactly
    /// as it did when the block was sealed:
    ///
    /// ```text
    /// {"frecuencia":{"media":100.0,"desv":0.0},"oxigeno":{"media":97.5,"desv":1.2}}
    /// ```
    pub fn canonical_string(&self) -> String {
        let entries: Vec<String> = self
            .0
            .iter()
            .map(|(channel, stats)| {
                format!(
                    "\"{}\":{{\"media\":{:?},\"desv\":{:?}}}",
                    channel.key(),
                    stats.mean,
                    stats.stddev
                )
            })
            .collect();
        format!("{{{}}}", entries.join(","))
    }
}

impl FromIterator<(Channel, ChannelStats)> for Datos {
    fn from_iter<I: IntoIterator<Item = (Channel, ChannelStats)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Datos {
    type Item = (&'a Channel, &'a ChannelStats);
    type IntoIter = btree_map::Iter<'a, Channel, ChannelStats>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One sealed ledger entry. Field names are the persisted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: Timestamp,
    pub datos: Datos,
    #[serde(rename = "alerta")]
    pub alert: bool,
    pub prev_hash: BlockHash,
    pub hash: BlockHash,
}

impl Block {
    /// Builds a block and computes its hash over `prev_hash`, `datos` and `timestamp`.
    pub fn seal(timestamp: Timestamp, datos: Datos, alert: bool, prev_hash: BlockHash) -> Self {
        let hash = compute_block_hash(&prev_hash, &datos, timestamp);
        Self {
            timestamp,
            datos,
            alert,
            prev_hash,
            hash,
        }
    }

    /// Hash this block should carry given its current contents.
    pub fn compute_hash(&self) -> BlockHash {
        compute_block_hash(&self.prev_hash, &self.datos, self.timestamp)
    }

    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// `prev_hash ++ canonical(datos) ++ timestamp`, the exact string fed to SHA-256.
pub fn block_hash_input(prev_hash: &str, datos: &Datos, timestamp: Timestamp) -> String {
    format!("{prev_hash}{}{timestamp}", datos.canonical_string())
}

pub fn compute_block_hash(prev_hash: &str, datos: &Datos, timestamp: Timestamp) -> BlockHash {
    let digest = Sha256::digest(block_hash_input(prev_hash, datos, timestamp).as_bytes());
    hex::encode(digest)
}

pub fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}
