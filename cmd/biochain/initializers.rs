use std::{io::IsTerminal, path::Path};

use biochain_storage::{EngineType, Store};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, filter::Directive, fmt};

use crate::cli::{LogColor, Options};

pub fn init_tracing(opts: &Options) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => stdout_is_tty,
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    fmt()
        .with_env_filter(log_filter)
        .with_target(include_target)
        .with_ansi(use_color)
        .with_thread_names(include_target)
        .init();
}

pub fn is_memory_ledger(path: &Path) -> bool {
    path.to_str() == Some("memory")
}

/// Opens the ledger store. An existing file is replaced on the first append.
pub fn open_store(ledger_path: &Path) -> Store {
    if is_memory_ledger(ledger_path) {
        info!("keeping ledger in memory only");
        Store::new(ledger_path, EngineType::InMemory)
    } else {
        info!(path = %ledger_path.display(), "persisting ledger as JSON");
        Store::new(ledger_path, EngineType::JsonFile)
    }
}
