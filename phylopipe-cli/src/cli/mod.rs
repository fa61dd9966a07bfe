pub mod commands;
pub mod options;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "phylopipe",
    version,
    about = "Search, align and build trees with external bioinformatics tools",
    long_about = "phylopipe runs a similarity search for a query, aligns the query with its hits \
                  and infers a phylogenetic tree, retrying transient tool failures and falling \
                  back to NCBI when no local database or search tool is available."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Application settings file (defaults to $PHYLOPIPE_HOME/config.toml)
    #[arg(long, value_name = "FILE", global = true, env = "PHYLOPIPE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn global(&self) -> GlobalOptions {
        GlobalOptions {
            verbose: self.verbose,
            config: self.config.clone(),
        }
    }
}

/// Flags shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbose: u8,
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run search, alignment and tree inference for one query
    Run(commands::run::RunArgs),

    /// Run many queries with a bounded number of concurrent pipelines
    Batch(commands::batch::BatchArgs),

    /// List presets or show a resolved configuration
    Presets {
        #[command(subcommand)]
        command: commands::presets::PresetsCommands,
    },

    /// Show registered methods and whether their tools are installed
    Tools(commands::tools::ToolsArgs),

    /// List local search databases
    Databases(commands::databases::DatabasesArgs),
}
