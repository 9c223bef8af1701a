use std::{path::PathBuf, process::ExitCode};

use biochain_chain_verifier::{
    LedgerStats, LedgerVerifier, load_ledger,
    report::{self, DEFAULT_REPORT_PATH},
};
use biochain_common::Channel;
use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, filter::Directive};

#[derive(Parser, Debug)]
#[command(name = "chain-verifier", version, about = "Verify the integrity of a biochain ledger")]
struct VerifierOptions {
    #[arg(value_name = "LEDGER", default_value = "blockchain.json")]
    ledger: PathBuf,

    #[arg(long, value_name = "PATH", default_value = DEFAULT_REPORT_PATH, help = "Where to write the text report")]
    report: PathBuf,

    #[arg(
        long = "channels",
        value_delimiter = ',',
        default_values_t = Channel::ALL.to_vec(),
        help = "Channels every block must contain"
    )]
    channels: Vec<Channel>,

    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "BIOCHAIN_LOG_LEVEL",
        help = "The verbosity level used for logs."
    )]
    log_level: Level,
}

const EXIT_INVALID: u8 = 1;
const EXIT_UNREADABLE: u8 = 2;

fn main() -> ExitCode {
    let opts = VerifierOptions::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let blocks = match load_ledger(&opts.ledger) {
        Ok(blocks) => blocks,
        Err(error) => {
            error!(error = %error, "cannot load ledger");
            return ExitCode::from(EXIT_UNREADABLE);
        }
    };
    if blocks.is_empty() {
        warn!(path = %opts.ledger.display(), "ledger is empty");
    }

    let verifier = LedgerVerifier::new(opts.channels.clone());
    let verification = verifier.verify(&blocks);
    let stats = LedgerStats::compute(&blocks, &verification, &opts.channels);

    match report::write_report(&opts.report, &opts.ledger, &verification, &stats) {
        Ok(()) => info!(path = %opts.report.display(), "report written"),
        Err(error) => error!(path = %opts.report.display(), error = %error, "failed to write report"),
    }

    println!("{}", report::console_summary(&verification, &stats));

    if verification.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    }
}
