use std::path::PathBuf;
use std::sync::OnceLock;

// Cache the paths to avoid repeated environment lookups
static PHYLOPIPE_HOME: OnceLock<PathBuf> = OnceLock::new();
static PHYLOPIPE_DATABASES_DIR: OnceLock<PathBuf> = OnceLock::new();
static PHYLOPIPE_WORKSPACE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Generate a UTC timestamp for run identifiers
/// Returns format: YYYYMMDD_HHMMSS (in UTC timezone)
pub fn generate_utc_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Get the phylopipe home directory
/// Checks PHYLOPIPE_HOME environment variable, falls back to ${HOME}/.phylopipe
pub fn phylopipe_home() -> PathBuf {
    PHYLOPIPE_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("PHYLOPIPE_HOME") {
                PathBuf::from(path)
            } else {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".phylopipe")
            }
        })
        .clone()
}

/// Get the local databases directory
/// Checks PHYLOPIPE_DATABASES_DIR environment variable, falls back to PHYLOPIPE_HOME/databases
pub fn phylopipe_databases_dir() -> PathBuf {
    PHYLOPIPE_DATABASES_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("PHYLOPIPE_DATABASES_DIR") {
                PathBuf::from(path)
            } else {
                phylopipe_home().join("databases")
            }
        })
        .clone()
}

/// Get the root directory for per-run workspaces
/// Checks PHYLOPIPE_WORKSPACE_DIR, falls back to $TMPDIR/phylopipe
pub fn phylopipe_workspace_dir() -> PathBuf {
    PHYLOPIPE_WORKSPACE_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("PHYLOPIPE_WORKSPACE_DIR") {
                PathBuf::from(path)
            } else {
                std::env::temp_dir().join("phylopipe")
            }
        })
        .clone()
}

/// Default location of the settings file
pub fn settings_path() -> PathBuf {
    phylopipe_home().join("config.toml")
}
