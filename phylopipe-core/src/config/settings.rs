//! Application settings (`~/.phylopipe/config.toml`)

use crate::error::PhyloError;
use crate::system::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub databases: DatabaseSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatabaseSettings {
    /// Directories searched for local BLAST databases
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_efetch_endpoint")]
    pub efetch_endpoint: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkspaceSettings {
    /// Root for per-run workspaces; defaults to the phylopipe workspace dir
    #[serde(default)]
    pub root: Option<PathBuf>,
}

// Default value functions
fn default_endpoint() -> String { "https://blast.ncbi.nlm.nih.gov/Blast.cgi".to_string() }
fn default_efetch_endpoint() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string()
}
fn default_poll_interval_secs() -> u64 { 15 }
fn default_max_wait_secs() -> u64 { 1_800 }
fn default_request_timeout_secs() -> u64 { 60 }

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            efetch_endpoint: default_efetch_endpoint(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Load from `PHYLOPIPE_CONFIG` or `$PHYLOPIPE_HOME/config.toml` when
    /// present, otherwise defaults
    pub fn load_default() -> Result<Self, PhyloError> {
        let path = std::env::var_os("PHYLOPIPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(paths::settings_path);

        if path.exists() {
            tracing::debug!(path = %path.display(), "loading settings");
            load_settings(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Configured database directories, then `BLASTDB` entries, then the
    /// phylopipe databases directory; duplicates removed
    pub fn database_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.databases.dirs.clone();

        if let Some(blastdb) = std::env::var_os("BLASTDB") {
            dirs.extend(std::env::split_paths(&blastdb));
        }
        dirs.push(paths::phylopipe_databases_dir());

        let mut unique = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        unique
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace
            .root
            .clone()
            .unwrap_or_else(paths::phylopipe_workspace_dir)
    }
}

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, PhyloError> {
    let contents = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&contents)
        .map_err(|e| PhyloError::Configuration(format!("Failed to parse settings: {}", e)))?;
    Ok(settings)
}

pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> Result<(), PhyloError> {
    let contents = toml::to_string_pretty(settings)
        .map_err(|e| PhyloError::Configuration(format!("Failed to serialize settings: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}
