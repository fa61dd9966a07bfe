use serde::{Deserialize, Serialize};
use std::fmt;

/// The three independently retryable units of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Search,
    Alignment,
    Tree,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Search, StageKind::Alignment, StageKind::Tree];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Search => "search",
            StageKind::Alignment => "alignment",
            StageKind::Tree => "tree",
        }
    }

    /// 1-based position in the pipeline
    pub fn position(&self) -> usize {
        match self {
            StageKind::Search => 1,
            StageKind::Alignment => 2,
            StageKind::Tree => 3,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Molecule type of a query or a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoleculeType {
    Protein,
    Nucleotide,
}

impl MoleculeType {
    /// NCBI database type argument (`-dbtype` / E-utilities `db`)
    pub fn ncbi_db(&self) -> &'static str {
        match self {
            MoleculeType::Protein => "protein",
            MoleculeType::Nucleotide => "nucleotide",
        }
    }
}

impl fmt::Display for MoleculeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ncbi_db())
    }
}

/// Terminal status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
    /// Stopped on request; not a failure
    Cancelled,
}

impl RunStatus {
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
