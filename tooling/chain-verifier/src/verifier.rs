use biochain_common::{
    Channel, ChannelStats, Datos, Timestamp,
    types::{compute_block_hash, short_hash},
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fields every persisted block must carry. A block missing any of them is not checked
/// any further.
pub const REQUIRED_FIELDS: [&str; 5] = ["timestamp", "datos", "alerta", "prev_hash", "hash"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("prev_hash does not match the previous block: expected '{expected}', found '{found}'")]
    ChainLinkBroken { expected: String, found: String },
    #[error("hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: String, found: String },
    #[error("datos is missing channel '{0}'")]
    MissingChannel(Channel),
    #[error("datos contains unexpected channel '{0}'")]
    UnexpectedChannel(String),
    #[error("channel '{channel}' must carry numeric 'media' and 'desv'")]
    InvalidChannelStats { channel: String },
}

impl Violation {
    pub fn is_chain_link(&self) -> bool {
        matches!(self, Violation::ChainLinkBroken { .. })
    }
}

/// Every violation found on one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFinding {
    pub index: usize,
    /// Stored hash, if the block has a string one.
    pub hash: Option<String>,
    pub violations: Vec<Violation>,
}

impl BlockFinding {
    /// The block's own content is damaged, as opposed to only its link to the previous
    /// block.
    pub fn is_corrupted(&self) -> bool {
        self.violations.iter().any(|violation| !violation.is_chain_link())
    }

    pub fn has_broken_link(&self) -> bool {
        self.violations.iter().any(Violation::is_chain_link)
    }

    pub fn short_hash(&self) -> &str {
        self.hash.as_deref().map(short_hash).unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub total_blocks: usize,
    /// Failing blocks only, in ledger order.
    pub findings: Vec<BlockFinding>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn invalid_count(&self) -> usize {
        self.findings.len()
    }

    pub fn corrupted_indices(&self) -> Vec<usize> {
        self.findings
            .iter()
            .filter(|finding| finding.is_corrupted())
            .map(|finding| finding.index)
            .collect()
    }

    pub fn broken_links(&self) -> Vec<usize> {
        self.findings
            .iter()
            .filter(|finding| finding.has_broken_link())
            .map(|finding| finding.index)
            .collect()
    }

    pub fn finding(&self, index: usize) -> Option<&BlockFinding> {
        self.findings.iter().find(|finding| finding.index == index)
    }
}

/// Recomputes every hash and chain link of a ledger.
#[derive(Debug, Clone)]
pub struct LedgerVerifier {
    channels: Vec<Channel>,
}

impl Default for LedgerVerifier {
    fn default() -> Self {
        Self::new(Channel::ALL.to_vec())
    }
}

impl LedgerVerifier {
    /// `channels` is the exact set each block's `datos` must contain.
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Walks the whole ledger. A failing block never stops the walk, and the next
    /// block is linked against the hash actually stored on it.
    pub fn verify(&self, blocks: &[Value]) -> VerificationReport {
        let mut expected_prev_hash = String::new();
        let mut findings = Vec::new();

        for (index, block) in blocks.iter().enumerate() {
            let violations = self.verify_block(block, &expected_prev_hash);
            let stored_hash = block.get("hash").and_then(Value::as_str);

            if violations.is_empty() {
                debug!(index, hash = stored_hash.map(short_hash).unwrap_or_default(), "block valid");
            } else {
                let summary: Vec<String> = violations.iter().map(ToString::to_string).collect();
                warn!(
                    index,
                    hash = stored_hash.map(short_hash).unwrap_or("N/A"),
                    violations = %summary.join("; "),
                    "invalid block"
                );
                findings.push(BlockFinding {
                    index,
                    hash: stored_hash.map(str::to_owned),
                    violations,
                });
            }

            if let Some(hash) = stored_hash {
                expected_prev_hash = hash.to_owned();
            }
        }

        let report = VerificationReport {
            total_blocks: blocks.len(),
            findings,
        };
        info!(
            blocks = report.total_blocks,
            invalid = report.invalid_count(),
            valid = report.is_valid(),
            "ledger verification finished"
        );
        report
    }

    /// Checks one block against the hash the previous block stored.
    pub fn verify_block(&self, block: &Value, expected_prev_hash: &str) -> Vec<Violation> {
        let Some(fields) = block.as_object() else {
            return vec![Violation::InvalidField {
                field: "block",
                expected: "a JSON object",
            }];
        };

        let missing: Vec<Violation> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !fields.contains_key(*field))
            .map(Violation::MissingField)
            .collect();
        if !missing.is_empty() {
            return missing;
        }

        let mut violations = Vec::new();

        let timestamp: Option<Timestamp> = fields.get("timestamp").and_then(Value::as_u64);
        if timestamp.is_none() {
            violations.push(Violation::InvalidField {
                field: "timestamp",
                expected: "a non-negative integer",
            });
        }
        if !fields.get("alerta").is_some_and(Value::is_boolean) {
            violations.push(Violation::InvalidField {
                field: "alerta",
                expected: "a boolean",
            });
        }

        let prev_hash = fields.get("prev_hash").and_then(Value::as_str);
        match prev_hash {
            None => violations.push(Violation::InvalidField {
                field: "prev_hash",
                expected: "a string",
            }),
            Some(found) if found != expected_prev_hash => {
                violations.push(Violation::ChainLinkBroken {
                    expected: expected_prev_hash.to_owned(),
                    found: found.to_owned(),
                });
            }
            Some(_) => {}
        }

        let hash = fields.get("hash").and_then(Value::as_str);
        if hash.is_none() {
            violations.push(Violation::InvalidField {
                field: "hash",
                expected: "a string",
            });
        }

        let (datos, datos_violations) = self.check_datos(fields);

        // Skipped when an input is unusable; that input is already reported.
        if let (Some(timestamp), Some(prev_hash), Some(found), Some(datos)) =
            (timestamp, prev_hash, hash, datos)
        {
            let expected = compute_block_hash(prev_hash, &datos, timestamp);
            if expected != found {
                violations.push(Violation::HashMismatch {
                    expected,
                    found: found.to_owned(),
                });
            }
        }

        violations.extend(datos_violations);
        violations
    }

    /// Structural check of `datos`. Returns the parsed stats when every entry is a known
    /// channel with numeric stats, which is what hashing needs.
    fn check_datos(&self, fields: &Map<String, Value>) -> (Option<Datos>, Vec<Violation>) {
        let Some(entries) = fields.get("datos").and_then(Value::as_object) else {
            return (
                None,
                vec![Violation::InvalidField {
                    field: "datos",
                    expected: "an object",
                }],
            );
        };

        let mut violations = Vec::new();
        for channel in &self.channels {
            match entries.get(channel.key()) {
                None => violations.push(Violation::MissingChannel(*channel)),
                Some(stats) if parse_stats(stats).is_none() => {
                    violations.push(Violation::InvalidChannelStats {
                        channel: channel.key().to_owned(),
                    });
                }
                Some(_) => {}
            }
        }

        let mut datos = Datos::new();
        let mut hashable = true;
        for (key, stats) in entries {
            let channel = Channel::from_key(key);
            if !channel.is_some_and(|channel| self.channels.contains(&channel)) {
                violations.push(Violation::UnexpectedChannel(key.clone()));
            }
            match (channel, parse_stats(stats)) {
                (Some(channel), Some(stats)) => {
                    datos.insert(channel, stats);
                }
                _ => hashable = false,
            }
        }

        (hashable.then_some(datos), violations)
    }
}

fn parse_stats(value: &Value) -> Option<ChannelStats> {
    let stats = value.as_object()?;
    Some(ChannelStats {
        mean: stats.get("media")?.as_f64()?,
        stddev: stats.get("desv")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use biochain_common::Block;
    use serde_json::json;

    fn datos(mean: f64) -> Datos {
        Channel::ALL
            .into_iter()
            .map(|channel| (channel, ChannelStats { mean, stddev: 1.5 }))
            .collect()
    }

    fn ledger(len: u64) -> Vec<Value> {
        let mut prev_hash = String::new();
        let mut blocks = Vec::new();
        for timestamp in 0..len {
            let block = Block::seal(timestamp, datos(90.0 + timestamp as f64), timestamp == 1, prev_hash);
            prev_hash = block.hash.clone();
            blocks.push(serde_json::to_value(&block).unwrap_or(Value::Null));
        }
        blocks
    }

    #[test]
    fn sealed_ledger_is_valid() {
        let report = LedgerVerifier::default().verify(&ledger(5));
        assert!(report.is_valid());
        assert_eq!(report.total_blocks, 5);
    }

    #[test]
    fn empty_ledger_is_vacuously_valid() {
        let report = LedgerVerifier::default().verify(&[]);
        assert!(report.is_valid());
        assert_eq!(report.total_blocks, 0);
    }

    #[test]
    fn missing_fields_short_circuit_other_checks() {
        let block = json!({ "timestamp": 0, "prev_hash": "bogus" });
        let violations = LedgerVerifier::default().verify_block(&block, "");
        assert_eq!(
            violations,
            vec![
                Violation::MissingField("datos"),
                Violation::MissingField("alerta"),
                Violation::MissingField("hash"),
            ]
        );
    }

    #[test]
    fn non_object_block_is_reported() {
        let violations = LedgerVerifier::default().verify_block(&json!(42), "");
        assert!(matches!(
            violations.as_slice(),
            [Violation::InvalidField { field: "block", .. }]
        ));
    }

    #[test]
    fn tampered_stats_are_a_hash_mismatch() {
        let mut blocks = ledger(3);
        if let Some(media) = blocks
            .get_mut(1)
            .and_then(|block| block.pointer_mut("/datos/oxigeno/media"))
        {
            *media = json!(99.99);
        }

        let report = LedgerVerifier::default().verify(&blocks);
        assert_eq!(report.corrupted_indices(), vec![1]);
        assert!(report.broken_links().is_empty());
        let violations = report.finding(1).map(|finding| finding.violations.clone());
        assert!(matches!(
            violations.as_deref(),
            Some([Violation::HashMismatch { .. }])
        ));
    }

    #[test]
    fn tampered_alert_flag_is_not_hashed() {
        let mut blocks = ledger(3);
        if let Some(alerta) = blocks.get_mut(0).and_then(|block| block.get_mut("alerta")) {
            *alerta = json!(true);
        }
        assert!(LedgerVerifier::default().verify(&blocks).is_valid());
    }

    #[test]
    fn datos_structure_is_checked_against_configured_channels() {
        let mut blocks = ledger(1);
        if let Some(datos) = blocks
            .get_mut(0)
            .and_then(|block| block.get_mut("datos"))
            .and_then(Value::as_object_mut)
        {
            datos.remove("presion");
            datos.insert("oxigeno".to_owned(), json!({ "media": "high", "desv": 0.0 }));
            datos.insert("temperatura".to_owned(), json!({ "media": 36.5, "desv": 0.1 }));
        }

        let report = LedgerVerifier::default().verify(&blocks);
        let violations = report
            .finding(0)
            .map(|finding| finding.violations.clone())
            .unwrap_or_default();
        assert_eq!(
            violations,
            vec![
                Violation::MissingChannel(Channel::BloodPressure),
                Violation::InvalidChannelStats {
                    channel: "oxigeno".to_owned()
                },
                Violation::UnexpectedChannel("temperatura".to_owned()),
            ]
        );
    }

    #[test]
    fn verifier_accepts_a_channel_subset() {
        let block = Block::seal(
            0,
            [(Channel::HeartRate, ChannelStats { mean: 80.0, stddev: 0.0 })]
                .into_iter()
                .collect(),
            false,
            String::new(),
        );
        let blocks = vec![serde_json::to_value(&block).unwrap_or(Value::Null)];

        assert!(LedgerVerifier::new(vec![Channel::HeartRate]).verify(&blocks).is_valid());
        let report = LedgerVerifier::default().verify(&blocks);
        assert_eq!(report.corrupted_indices(), vec![0]);
    }

    #[test]
    fn wrong_field_types_are_reported() {
        let mut blocks = ledger(1);
        if let Some(block) = blocks.get_mut(0).and_then(Value::as_object_mut) {
            block.insert("timestamp".to_owned(), json!("zero"));
            block.insert("alerta".to_owned(), json!(0));
        }

        let violations = LedgerVerifier::default()
            .verify(&blocks)
            .finding(0)
            .map(|finding| finding.violations.clone())
            .unwrap_or_default();
        assert_eq!(
            violations,
            vec![
                Violation::InvalidField {
                    field: "timestamp",
                    expected: "a non-negative integer"
                },
                Violation::InvalidField {
                    field: "alerta",
                    expected: "a boolean"
                },
            ]
        );
    }
}
