//! `run_report.json`, the machine-readable record of one run

use crate::orchestrator::PipelineRun;
use crate::retry::{serialize_millis, StageReport};
use chrono::{DateTime, Utc};
use phylopipe_core::{
    AlignmentResult, ErrorKind, PhyloError, PhyloResult, PipelineConfig, ResourceSnapshot,
    RunStatus, SearchResult, SearchSource, TreeResult,
};
use phylopipe_utils::CleanupReport;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RUN_REPORT_FILE: &str = "run_report.json";
pub const SEARCH_HITS_FILE: &str = "search_hits.tsv";
pub const ALIGNMENT_FILE: &str = "alignment.fasta";
pub const TREE_FILE: &str = "tree.nwk";

/// Files a run left in its output directory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunOutputs {
    pub search_hits: Option<PathBuf>,
    pub alignment: Option<PathBuf>,
    pub tree: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub source: SearchSource,
    pub database: String,
    pub hits: usize,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl From<&SearchResult> for SearchSummary {
    fn from(result: &SearchResult) -> Self {
        Self {
            source: result.source,
            database: result.database.clone(),
            hits: result.len(),
            duration: result.duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub records: usize,
    pub length: usize,
    pub gap_fraction: f64,
}

impl From<&AlignmentResult> for AlignmentSummary {
    fn from(alignment: &AlignmentResult) -> Self {
        Self {
            records: alignment.len(),
            length: alignment.length,
            gap_fraction: alignment.gap_fraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSummary {
    pub leaves: usize,
    pub bootstrap_replicates: u32,
    /// Supports of internal branches, when bootstrapped
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<Option<f64>>,
}

impl From<&TreeResult> for TreeSummary {
    fn from(tree: &TreeResult) -> Self {
        Self {
            leaves: tree.leaf_count(),
            bootstrap_replicates: tree.bootstrap_replicates,
            supports: if tree.bootstrap_replicates > 0 {
                tree.supports.clone()
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    pub message: String,
    pub exit_code: i32,
}

impl From<&PhyloError> for ErrorSummary {
    fn from(err: &PhyloError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            exit_code: err.exit_code(),
        }
    }
}

/// Serialized view over a finished [`PipelineRun`]
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub run_id: &'a str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub query: &'a Path,
    pub output_dir: &'a Path,
    pub status: RunStatus,
    pub exit_code: i32,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub config: &'a PipelineConfig,
    pub preflight: Option<&'a ResourceSnapshot>,
    pub search: Option<&'a SearchSummary>,
    pub alignment: Option<&'a AlignmentSummary>,
    pub tree: Option<&'a TreeSummary>,
    pub stages: &'a [StageReport],
    pub error: Option<ErrorSummary>,
    pub outputs: &'a RunOutputs,
    pub workspace: &'a CleanupReport,
}

impl<'a> RunReport<'a> {
    pub fn from_run(run: &'a PipelineRun) -> Self {
        Self {
            run_id: &run.id,
            version: phylopipe_core::VERSION,
            generated_at: Utc::now(),
            query: &run.query,
            output_dir: &run.output_dir,
            status: run.status,
            exit_code: run.exit_code(),
            elapsed: run.elapsed,
            config: &run.config,
            preflight: run.preflight.as_ref(),
            search: run.search.as_ref(),
            alignment: run.alignment.as_ref(),
            tree: run.tree.as_ref(),
            stages: &run.reports,
            error: run.error.as_ref().map(ErrorSummary::from),
            outputs: &run.outputs,
            workspace: &run.cleanup,
        }
    }

    pub fn to_json(&self) -> PhyloResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `path`, creating parent directories
    pub fn write(&self, path: &Path) -> PhyloResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
