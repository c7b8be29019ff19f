//! clc: counts the lines in source code files, broken down by language.
//!
//! Every root is walked depth-first in name order; each accepted file is
//! counted on a small worker pool and the results are folded into one
//! sorted report, printed to stdout.

mod cli;
mod config;
mod counter;
mod error;
mod filter;
mod languages;
mod metrics;
mod pool;
mod report;
mod walker;

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::counter::FileCounter;
use crate::error::ClcError;
use crate::filter::PathFilter;
use crate::languages::{default_language_files, load_language_files, LanguageRegistry};
use crate::metrics::RunMetrics;
use crate::report::{aggregate, RenderOptions};

const LOG_ENV_VAR: &str = "CLC_LOG";

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("clc: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(args: Args) -> Result<(), ClcError> {
    let registry = LanguageRegistry::builtin()
        .with_user_languages(load_language_files(&default_language_files()));
    if args.list_languages {
        print!("{}", registry.listing());
        return Ok(());
    }
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = args.into_configuration(&registry)?;
    config.validate()?;
    debug!("configuration: {:?}", config);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("cannot install the interrupt handler: {}", err);
    }

    let metrics = RunMetrics::new();
    let tally = pool::count_files(
        PathFilter::new(&config, &registry),
        FileCounter::new(config.comments),
        config.jobs,
        &cancel,
        &metrics,
    )?;
    metrics.log_summary();

    let report = aggregate(tally.records, tally.skips.len(), &config);
    let current_dir = env::current_dir()
        .and_then(fs::canonicalize)
        .unwrap_or_else(|_| PathBuf::from("."));
    print!("{}", report.render(&RenderOptions::detect(current_dir)));
    Ok(())
}
