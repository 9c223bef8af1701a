use biochain_common::Channel;
use serde_json::Value;

use crate::verifier::VerificationReport;

/// Aggregate figures over a whole ledger, computed independently of the verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub total_blocks: usize,
    pub alert_blocks: usize,
    /// Mean of `media` over every block carrying the channel, rounded to 2 decimals.
    /// Zero when no block carries it.
    pub channel_means: Vec<(Channel, f64)>,
    /// Blocks with any violation.
    pub invalid_blocks: usize,
    /// Blocks whose own content is damaged.
    pub corrupted_blocks: usize,
    pub integrity_percentage: f64,
}

impl LedgerStats {
    pub fn compute(blocks: &[Value], report: &VerificationReport, channels: &[Channel]) -> Self {
        let total_blocks = blocks.len();
        let alert_blocks = blocks
            .iter()
            .filter(|block| block.get("alerta").and_then(Value::as_bool).unwrap_or(false))
            .count();

        let channel_means = channels
            .iter()
            .map(|&channel| {
                let values: Vec<f64> = blocks
                    .iter()
                    .filter_map(|block| {
                        block
                            .get("datos")?
                            .get(channel.key())?
                            .get("media")?
                            .as_f64()
                    })
                    .collect();
                (channel, round2(mean(&values)))
            })
            .collect();

        let invalid_blocks = report.invalid_count();
        let integrity_percentage = if total_blocks == 0 {
            0.0
        } else {
            round2(ratio(total_blocks.saturating_sub(invalid_blocks), total_blocks) * 100.0)
        };

        Self {
            total_blocks,
            alert_blocks,
            channel_means,
            invalid_blocks,
            corrupted_blocks: report.corrupted_indices().len(),
            integrity_percentage,
        }
    }

    pub fn alert_percentage(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }
        ratio(self.alert_blocks, self.total_blocks) * 100.0
    }

    pub fn channel_mean(&self, channel: Channel) -> Option<f64> {
        self.channel_means
            .iter()
            .find(|(candidate, _)| *candidate == channel)
            .map(|(_, mean)| *mean)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    let part = u32::try_from(part).map(f64::from).unwrap_or(f64::MAX);
    let whole = u32::try_from(whole).map(f64::from).unwrap_or(f64::MAX);
    part / whole
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / ratio(values.len(), 1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{BlockFinding, Violation};
    use serde_json::json;

    fn block(alert: bool, heart_rate: f64) -> Value {
        json!({
            "timestamp": 0,
            "datos": {
                "frecuencia": { "media": heart_rate, "desv": 0.0 },
                "presion": { "media": 120.0, "desv": 0.0 },
            },
            "alerta": alert,
            "prev_hash": "",
            "hash": "",
        })
    }

    #[test]
    fn empty_ledger_has_zero_integrity() {
        let stats = LedgerStats::compute(&[], &VerificationReport::default(), &Channel::ALL);
        assert_eq!(stats.total_blocks, 0);
        assert_eq!(stats.integrity_percentage, 0.0);
        assert_eq!(stats.alert_percentage(), 0.0);
        assert_eq!(stats.channel_mean(Channel::Oxygen), Some(0.0));
    }

    #[test]
    fn aggregates_alerts_means_and_integrity() {
        let blocks = vec![block(false, 80.0), block(true, 90.0), block(false, 101.0)];
        let report = VerificationReport {
            total_blocks: 3,
            findings: vec![BlockFinding {
                index: 2,
                hash: None,
                violations: vec![Violation::MissingChannel(Channel::Oxygen)],
            }],
        };

        let stats = LedgerStats::compute(&blocks, &report, &Channel::ALL);

        assert_eq!(stats.alert_blocks, 1);
        assert_eq!(stats.channel_mean(Channel::HeartRate), Some(90.33));
        assert_eq!(stats.channel_mean(Channel::BloodPressure), Some(120.0));
        assert_eq!(stats.channel_mean(Channel::Oxygen), Some(0.0));
        assert_eq!(stats.invalid_blocks, 1);
        assert_eq!(stats.corrupted_blocks, 1);
        assert_eq!(stats.integrity_percentage, 66.67);
    }

    #[test]
    fn broken_link_counts_against_integrity_but_not_corruption() {
        let blocks = vec![block(false, 80.0), block(false, 80.0)];
        let report = VerificationReport {
            total_blocks: 2,
            findings: vec![BlockFinding {
                index: 1,
                hash: Some(String::new()),
                violations: vec![Violation::ChainLinkBroken {
                    expected: "a".to_owned(),
                    found: "b".to_owned(),
                }],
            }],
        };

        let stats = LedgerStats::compute(&blocks, &report, &Channel::ALL);
        assert_eq!(stats.corrupted_blocks, 0);
        assert_eq!(stats.integrity_percentage, 50.0);
    }
}
