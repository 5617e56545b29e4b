//! Command line front end for the highlighter engine.

mod cli;
mod commands;
mod config;
mod session;

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Args;

const CRATES: [&str; 7] = [
    "highlighter",
    "highlighter_engine",
    "highlighter_clips",
    "highlighter_markers",
    "highlighter_render",
    "highlighter_realtime",
    "highlighter_ipc",
];

/// Default filter directives for the given verbosity.
fn default_directives(verbose: u8, quiet: bool) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging; `RUST_LOG` wins over the flags.
fn init_logging(verbose: u8, quiet: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(verbose, quiet).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = commands::run(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
