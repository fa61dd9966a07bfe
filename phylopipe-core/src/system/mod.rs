pub mod paths;
pub mod resources;

// Re-export commonly used functions
pub use paths::{
    generate_utc_timestamp, phylopipe_databases_dir, phylopipe_home, phylopipe_workspace_dir,
    settings_path,
};
pub use resources::{ResourceChecker, ResourceProbe, ResourceSnapshot, SystemProbe};
