//! Core utilities and types shared across all phylopipe crates

pub mod config;
pub mod error;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::{
    MethodCatalog, OverrideMap, PipelineConfig, PresetDocument, ResourceLimits, Settings,
    TreeCapabilities,
};
pub use error::{ErrorKind, PhyloError, PhyloResult};

pub use types::{
    AlignedRecord, AlignmentResult, MoleculeType, RunStatus, SearchHit, SearchResult,
    SearchSource, StageKind, TreeResult,
};

pub use system::{
    phylopipe_home, phylopipe_workspace_dir, ResourceChecker, ResourceProbe, ResourceSnapshot,
    SystemProbe,
};

/// Version information for the phylopipe project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
