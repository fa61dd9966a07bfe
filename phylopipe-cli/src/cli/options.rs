//! Options and setup shared by the `run` and `batch` commands

use super::GlobalOptions;
use anyhow::Context;
use clap::Args;
use phylopipe_core::config::{
    load_overrides, load_settings as load_settings_file, parse_assignment, resolve,
};
use phylopipe_core::{MethodCatalog, OverrideMap, PipelineConfig, PresetDocument, Settings};
use phylopipe_pipeline::{CancelSignal, PipelineBuilder};
use phylopipe_utils::{warning, WorkspaceConfig};
use std::path::PathBuf;

/// Preset selection and overrides
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Preset to start from (quick, standard, publication, or one from --presets)
    #[arg(short, long, value_name = "NAME")]
    pub preset: String,

    /// Preset document used instead of the built-in presets
    #[arg(long, value_name = "FILE")]
    pub presets: Option<PathBuf>,

    /// Override document (TOML, or JSON by extension)
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    /// Override a single key, applied after --overrides (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

impl ConfigArgs {
    pub fn document(&self) -> anyhow::Result<PresetDocument> {
        preset_document(self.presets.as_ref())
    }

    /// The override document first, then every `--set` in order
    pub fn overrides(&self) -> anyhow::Result<OverrideMap> {
        let mut overrides = match &self.overrides {
            Some(path) => load_overrides(path)?,
            None => OverrideMap::new(),
        };
        extend_assignments(&mut overrides, &self.set)?;
        Ok(overrides)
    }

    pub fn resolve(&self, catalog: &dyn MethodCatalog) -> anyhow::Result<PipelineConfig> {
        let document = self.document()?;
        let overrides = self.overrides()?;
        Ok(resolve(&document, &self.preset, &overrides, catalog)?)
    }
}

pub fn preset_document(path: Option<&PathBuf>) -> anyhow::Result<PresetDocument> {
    match path {
        Some(path) => Ok(PresetDocument::load(path)?),
        None => Ok(PresetDocument::builtin()),
    }
}

pub fn extend_assignments(overrides: &mut OverrideMap, assignments: &[String]) -> anyhow::Result<()> {
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        overrides.insert(key, value);
    }
    Ok(())
}

/// Settings from `--config`, else `PHYLOPIPE_CONFIG` or the default file
pub fn load_settings(global: &GlobalOptions) -> anyhow::Result<Settings> {
    match &global.config {
        Some(path) => load_settings_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::load_default()?),
    }
}

/// Builder wired to the configured remote services, databases and workspace root
pub fn pipeline_builder(
    settings: &Settings,
    keep_intermediates: bool,
    cancel: CancelSignal,
) -> anyhow::Result<PipelineBuilder> {
    let mut builder = PipelineBuilder::from_settings(settings)
        .context("failed to set up the remote search client")?
        .cancel_signal(cancel);

    if keep_intermediates {
        builder = builder.workspace(WorkspaceConfig::new(settings.workspace_root()).retain(true));
    }
    Ok(builder)
}

/// Trigger `cancel` on Ctrl-C; must be called inside the runtime
pub fn cancel_on_interrupt(cancel: &CancelSignal) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warning("Interrupted, cancelling the run...");
            cancel.trigger();
        }
    });
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}
