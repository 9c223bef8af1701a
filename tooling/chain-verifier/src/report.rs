//! Human-readable rendering of a verification run.

use std::{fmt::Write as _, path::Path};

use biochain_common::Channel;

use crate::{stats::LedgerStats, verifier::VerificationReport};

pub const DEFAULT_REPORT_PATH: &str = "reporte.txt";

fn channel_label(channel: Channel) -> (&'static str, &'static str) {
    match channel {
        Channel::HeartRate => ("Average heart rate", " bpm"),
        Channel::BloodPressure => ("Average blood pressure", " mmHg"),
        Channel::Oxygen => ("Average blood oxygen", "%"),
    }
}

/// Full text report: general statistics, per-channel averages and every invalid block.
pub fn render_report(ledger: &Path, report: &VerificationReport, stats: &LedgerStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "BIOMETRIC LEDGER REPORT");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Ledger: {}", ledger.display());
    let _ = writeln!(out);

    let _ = writeln!(out, "GENERAL STATISTICS");
    let _ = writeln!(out, "{}", "-".repeat(25));
    if stats.total_blocks == 0 {
        let _ = writeln!(out, "WARNING: the ledger is empty");
    }
    let _ = writeln!(out, "Total blocks: {}", stats.total_blocks);
    let _ = writeln!(out, "Blocks with medical alerts: {}", stats.alert_blocks);
    let _ = writeln!(out, "Alert percentage: {:.1}%", stats.alert_percentage());
    let _ = writeln!(out, "Chain integrity: {}%", stats.integrity_percentage);
    let _ = writeln!(out);

    let _ = writeln!(out, "CHANNEL AVERAGES");
    let _ = writeln!(out, "{}", "-".repeat(25));
    for (channel, mean) in &stats.channel_means {
        let (label, unit) = channel_label(*channel);
        let _ = writeln!(out, "{label}: {mean}{unit}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "INTEGRITY CHECK");
    let _ = writeln!(out, "{}", "-".repeat(30));
    if report.is_valid() {
        let _ = writeln!(out, "Ledger intact, no invalid blocks");
    } else {
        let _ = writeln!(
            out,
            "{} invalid block(s): {} corrupted, {} with a broken chain link",
            report.invalid_count(),
            stats.corrupted_blocks,
            report.broken_links().len()
        );
        let _ = writeln!(out);
        for finding in &report.findings {
            let _ = writeln!(out, "  - Block {}: {}...", finding.index, finding.short_hash());
            for violation in &finding.violations {
                let _ = writeln!(out, "    * {violation}");
            }
        }
    }
    out
}

pub fn write_report(
    destination: &Path,
    ledger: &Path,
    report: &VerificationReport,
    stats: &LedgerStats,
) -> std::io::Result<()> {
    std::fs::write(destination, render_report(ledger, report, stats))
}

/// Short summary printed after the report file is written.
pub fn console_summary(report: &VerificationReport, stats: &LedgerStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "VERIFICATION SUMMARY");
    let _ = writeln!(out, "{}", "=".repeat(30));
    let _ = writeln!(out, "Total blocks:       {}", stats.total_blocks);
    let _ = writeln!(out, "Alert blocks:       {}", stats.alert_blocks);
    for (channel, mean) in &stats.channel_means {
        let _ = writeln!(out, "{:<20}{mean}", format!("{channel} mean:"));
    }
    let _ = writeln!(out, "Integrity:          {}%", stats.integrity_percentage);
    let verdict = if report.is_valid() {
        "VALID".to_owned()
    } else {
        format!("INVALID ({} block(s) with errors)", report.invalid_count())
    };
    let _ = write!(out, "Verdict:            {verdict}");
    out
}
