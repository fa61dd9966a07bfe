//! Shared utilities for phylopipe
//!
//! Provides the per-run workspace, progress reporting and console output
//! formatting.

pub mod output;
pub mod progress;
pub mod workspace;

// Re-export commonly used types
pub use output::{
    create_standard_table, error, format_duration, format_number, header_cell, info,
    section_header, status_cell, success, tree_item, warning,
};
pub use progress::{
    create_spinner, ConsoleReporter, NullReporter, ProgressEvent, ProgressReporter,
    TracingReporter,
};
pub use workspace::{CleanupReport, Workspace, WorkspaceConfig, WorkspaceMetadata, WorkspaceStatus};
