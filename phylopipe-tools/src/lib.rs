//! External tool backends for phylopipe
//!
//! Every search, alignment and tree method is a backend object that knows
//! how to build the command line for its tool. Backends are collected in
//! read-only [`Registry`] instances; processes are launched through a
//! [`ToolRunner`] so stages can be tested without the real executables.

// Modules
pub mod aligners;
pub mod fetch;
pub mod registry;
pub mod remote;
pub mod runner;
pub mod search;
pub mod traits;
pub mod trees;
pub mod types;

// Re-exports for convenience
pub use fetch::{accession_of, BlastDbFetcher, EntrezFetcher, SequenceSource};
pub use registry::{Registries, Registry, RegistryBuilder};
pub use remote::{NcbiBlastClient, RemoteSearch, RemoteSearchRequest};
pub use runner::{ProcessRunner, ToolRunner};
pub use search::{DatabaseFormat, LocalDatabase, LocalDatabaseCatalog};
pub use traits::{
    AlignmentBackend, AlignmentRequest, AvailabilityProbe, Backend, PathProbe, SearchBackend,
    SearchRequest, TreeBackend, TreeRequest,
};
pub use types::{ToolCommand, ToolOutput};
