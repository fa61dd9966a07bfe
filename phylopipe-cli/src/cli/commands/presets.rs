use crate::cli::options::{extend_assignments, preset_document};
use anyhow::Context;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use phylopipe_core::config::{load_overrides, resolve};
use phylopipe_core::OverrideMap;
use phylopipe_tools::Registries;
use phylopipe_utils::{create_standard_table, header_cell, section_header};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PresetsCommands {
    /// List available presets
    List(ListArgs),

    /// Print the configuration a preset resolves to
    Show(ShowArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Preset document used instead of the built-in presets
    #[arg(long, value_name = "FILE")]
    pub presets: Option<PathBuf>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Preset name
    pub name: String,

    /// Preset document used instead of the built-in presets
    #[arg(long, value_name = "FILE")]
    pub presets: Option<PathBuf>,

    /// Override document (TOML, or JSON by extension)
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    /// Override a single key (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Output format (toml, json)
    #[arg(short, long, default_value = "toml")]
    pub format: String,
}

pub fn run(command: PresetsCommands) -> anyhow::Result<i32> {
    match command {
        PresetsCommands::List(args) => list(args),
        PresetsCommands::Show(args) => show(args),
    }
}

fn list(args: ListArgs) -> anyhow::Result<i32> {
    let document = preset_document(args.presets.as_ref())?;

    section_header("Presets");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Preset"),
        header_cell("Search"),
        header_cell("Alignment"),
        header_cell("Tree"),
        header_cell("Bootstrap"),
        header_cell("Description"),
    ]);

    for name in document.names() {
        let config = document.preset_config(&name)?;
        let description = document
            .entry(&name)
            .map(|entry| entry.description.clone())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&name),
            Cell::new(format!("{} / {}", config.search_method, config.search_database)),
            Cell::new(&config.alignment_method),
            Cell::new(format!("{} ({})", config.tree_method, config.tree_model)),
            Cell::new(config.bootstrap_replicates),
            Cell::new(description),
        ]);
    }

    println!("{}", table);
    Ok(0)
}

fn show(args: ShowArgs) -> anyhow::Result<i32> {
    let document = preset_document(args.presets.as_ref())?;
    let mut overrides = match &args.overrides {
        Some(path) => load_overrides(path)?,
        None => OverrideMap::new(),
    };
    extend_assignments(&mut overrides, &args.set)?;

    let config = resolve(&document, &args.name, &overrides, &Registries::standard())?;

    let rendered = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(&config)?,
        _ => toml::to_string_pretty(&config).context("failed to render configuration")?,
    };
    println!("{}", rendered.trim_end());
    Ok(0)
}
