//! Test utilities for the phylopipe workspace
//!
//! Fixtures, an isolated on-disk environment and mock collaborators for the
//! pipeline: a runner that simulates the external tools, a scripted remote
//! search service, a sequence source, an availability probe, fixed host
//! resources and a reporter that records every progress event.

pub mod environment;
pub mod fixtures;
pub mod mock;

// Re-export commonly used items
pub use environment::TestEnvironment;
pub use fixtures::{hemoglobin_hits, hemoglobin_library, hemoglobin_query, hit, self_hits, two_sequence_query};
pub use mock::{
    FixedResources, MockRemoteSearch, MockSequenceSource, RecordingReporter, ScriptedRunner,
    StaticProbe,
};

// Re-export test dependencies for convenience
pub use anyhow::{Context, Result};
pub use tempfile;

/// Initialize test logging (call once per test module)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PHYLOPIPE_LOG"))
        .with_test_writer()
        .try_init();
}
