use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use driftrec::cli::Cli;
use driftrec::config::Config;
use driftrec::{DriftContext, run};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = try_main(&cli) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}

fn try_main(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let ctx = DriftContext::new(config, cli.verbose);
    run::run(&ctx)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "driftrec=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_env("DRIFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
