//! Core type definitions shared across phylopipe crates

pub mod alignment;
pub mod search;
pub mod stage;
pub mod tree;

pub use alignment::{AlignedRecord, AlignmentResult};
pub use search::{sort_hits, SearchHit, SearchResult, SearchSource};
pub use stage::{MoleculeType, RunStatus, StageKind};
pub use tree::TreeResult;
