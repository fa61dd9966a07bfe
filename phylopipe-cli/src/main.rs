use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::{Cli, Commands};
use phylopipe_core::PhyloError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code_for(&e)
        }
    };
    process::exit(code);
}

/// `-v` flags win over `PHYLOPIPE_LOG`, which wins over the `warn` default
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var("PHYLOPIPE_LOG")
            .ok()
            .and_then(|level| EnvFilter::try_new(level).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<PhyloError>())
        .map(PhyloError::exit_code)
        .unwrap_or(1)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global();

    match cli.command {
        Commands::Run(args) => crate::cli::commands::run::run(args, &global),
        Commands::Batch(args) => crate::cli::commands::batch::run(args, &global),
        Commands::Presets { command } => crate::cli::commands::presets::run(command),
        Commands::Tools(args) => crate::cli::commands::tools::run(args),
        Commands::Databases(args) => crate::cli::commands::databases::run(args, &global),
    }
}
