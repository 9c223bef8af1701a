mod cli;
mod initializers;

use biochain_blockchain::{Pipeline, RandomVitals};
use clap::Parser;
use tracing::{info, warn};

use crate::{
    cli::CLI,
    initializers::{init_tracing, open_store},
};

fn main() -> eyre::Result<()> {
    let CLI { opts } = CLI::parse();
    init_tracing(&opts);

    let config = opts.pipeline_config()?;
    let expected = config.sample_count;
    let store = open_store(&config.ledger_path);
    let generator = RandomVitals::new(config.seed);
    let ledger_path = config.ledger_path.clone();

    let summary = Pipeline::new(config, generator)?.run(store)?;

    if summary.is_complete(expected) {
        info!(blocks = summary.blocks_created, path = %ledger_path.display(), "ledger complete");
    } else {
        warn!(
            blocks = summary.blocks_created,
            expected,
            incomplete_ticks = ?summary.incomplete_ticks,
            "ledger incomplete"
        );
    }
    if summary.metrics.persist_failures > 0 {
        warn!(
            failures = summary.metrics.persist_failures,
            "ledger file may be stale, some writes failed"
        );
    }

    println!("Blocks created: {}/{expected}", summary.blocks_created);
    if let Some(head) = summary.store.blocks().last() {
        println!("Head: {} (timestamp {})", head.short_hash(), head.timestamp);
    }
    println!("{}", summary.metrics);
    Ok(())
}
