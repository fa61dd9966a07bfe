//! Traits for backend tools

use crate::types::ToolCommand;
use phylopipe_bio::formats::tabular::parse_tabular;
use phylopipe_core::{MoleculeType, PhyloError, PhyloResult, SearchHit};
use std::path::{Path, PathBuf};

/// What every registered tool exposes
pub trait Backend: Send + Sync {
    /// Logical method name used in configuration
    fn name(&self) -> &'static str;

    /// Executable looked up by the availability probe
    fn binary(&self) -> &'static str;

    /// How to install the tool when it is missing
    fn install_hint(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }
}

/// Parameters of one local search invocation
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a Path,
    /// Database path prefix (without volume extension)
    pub database: &'a Path,
    pub output: &'a Path,
    pub evalue: f64,
    pub max_hits: usize,
    pub threads: usize,
}

pub trait SearchBackend: Backend {
    fn molecule_type(&self) -> MoleculeType;

    fn database_format(&self) -> crate::search::DatabaseFormat;

    /// BLAST program the remote service should run instead
    fn remote_program(&self) -> &'static str;

    fn command(&self, request: &SearchRequest<'_>) -> ToolCommand;

    fn parse_hits(&self, output: &str) -> PhyloResult<Vec<SearchHit>> {
        parse_tabular(output)
    }
}

#[derive(Debug, Clone)]
pub struct AlignmentRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Scratch directory for tools that drop side files
    pub work_dir: &'a Path,
    pub threads: usize,
}

pub trait AlignmentBackend: Backend {
    fn command(&self, request: &AlignmentRequest<'_>) -> ToolCommand;
}

#[derive(Debug, Clone)]
pub struct TreeRequest<'a> {
    pub alignment: &'a Path,
    pub work_dir: &'a Path,
    pub model: &'a str,
    /// Residue alphabet of the alignment
    pub molecule: MoleculeType,
    pub bootstrap_replicates: u32,
    pub threads: usize,
    pub seed: u64,
}

pub trait TreeBackend: Backend {
    fn supported_models(&self) -> &'static [&'static str];

    fn supports_bootstrap(&self) -> bool;

    fn command(&self, request: &TreeRequest<'_>) -> ToolCommand;

    /// Where the tool leaves the final tree
    fn tree_file(&self, request: &TreeRequest<'_>) -> PathBuf;

    /// Canonical spelling of `model`, if supported
    fn find_model(&self, model: &str) -> Option<&'static str> {
        self.supported_models()
            .iter()
            .copied()
            .find(|m| m.eq_ignore_ascii_case(model))
    }

    /// Reject requests the tool cannot honour, before anything is launched
    fn check_request(&self, request: &TreeRequest<'_>) -> PhyloResult<()> {
        if self.find_model(request.model).is_none() {
            return Err(PhyloError::config(format!(
                "tree method '{}' does not support model '{}' (supported: {})",
                self.name(),
                request.model,
                self.supported_models().join(", ")
            )));
        }
        if request.bootstrap_replicates > 0 && !self.supports_bootstrap() {
            return Err(PhyloError::config(format!(
                "tree method '{}' does not support bootstrap replicates (requested {})",
                self.name(),
                request.bootstrap_replicates
            )));
        }
        Ok(())
    }
}

/// Installation-presence check for backend binaries
pub trait AvailabilityProbe: Send + Sync {
    fn locate(&self, binary: &str) -> Option<PathBuf>;

    fn is_installed(&self, binary: &str) -> bool {
        self.locate(binary).is_some()
    }
}

/// Looks binaries up on `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct PathProbe;

impl AvailabilityProbe for PathProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }
}
