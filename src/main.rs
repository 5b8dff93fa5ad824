mod cli;
mod commands;
mod error;

use crate::cli::Args;
use crate::error::ErrorKind;
use clap::Parser;
use cpx_config::Config;
use exn::ResultExt;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        },
    };
    init_tracing(&config.log, args.verbose);
    tracing::debug!(?config, "loaded configuration");

    match commands::run(args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind: &ErrorKind = &err;
            tracing::error!(error = %kind, "command failed");
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured filter.
fn init_tracing(configured: &str, verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
