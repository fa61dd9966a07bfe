/// Per-run scratch workspace
///
/// Every intermediate file a stage produces is registered here under the
/// stage that made it, so a retry can throw away exactly that stage's
/// partial outputs and the whole directory can be released on any exit path.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use phylopipe_core::system::paths::generate_utc_timestamp;
use phylopipe_core::{PhyloError, PhyloResult, StageKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const METADATA_FILE: &str = "workspace.json";

/// Configuration for workspace behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory under which each run gets its own workspace
    pub root: PathBuf,
    /// Keep the workspace and its files after release
    pub retain: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: phylopipe_core::phylopipe_workspace_dir(),
            retain: std::env::var("PHYLOPIPE_KEEP_WORKSPACE").is_ok(),
        }
    }
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retain: false,
        }
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
    Preserved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub label: String,
    pub status: WorkspaceStatus,
    pub error_message: Option<String>,
}

/// What [`Workspace::release`] did
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub workspace: PathBuf,
    pub removed_files: usize,
    pub retained: bool,
    /// Paths that could not be removed, with the reason
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct Workspace {
    pub id: String,
    root: PathBuf,
    retain: bool,
    files: Mutex<BTreeMap<StageKind, Vec<PathBuf>>>,
    metadata: Mutex<WorkspaceMetadata>,
    released: Mutex<Option<CleanupReport>>,
}

impl Workspace {
    /// Create a fresh, uniquely named workspace under `config.root`
    pub fn create(config: &WorkspaceConfig, label: &str) -> PhyloResult<Self> {
        fs::create_dir_all(&config.root).map_err(|e| {
            PhyloError::Io(io::Error::new(
                e.kind(),
                format!("cannot create workspace root {}: {}", config.root.display(), e),
            ))
        })?;

        let id = format!("{}_{}", generate_utc_timestamp(), Uuid::new_v4().simple());
        let root = config.root.join(&id);
        fs::create_dir_all(&root)?;

        let metadata = WorkspaceMetadata {
            id: id.clone(),
            created_at: Utc::now(),
            label: label.to_string(),
            status: WorkspaceStatus::Active,
            error_message: None,
        };

        let workspace = Self {
            id,
            root,
            retain: config.retain,
            files: Mutex::new(BTreeMap::new()),
            metadata: Mutex::new(metadata),
            released: Mutex::new(None),
        };
        workspace.save_metadata()?;

        tracing::debug!(workspace = %workspace.root.display(), label, "created workspace");
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retains(&self) -> bool {
        self.retain
    }

    pub fn stage_dir(&self, stage: StageKind) -> PathBuf {
        self.root.join(stage.name())
    }

    /// Fresh directory for one attempt of a stage, registered under that stage
    pub fn attempt_dir(&self, stage: StageKind, attempt: u32) -> PhyloResult<PathBuf> {
        let dir = self.stage_dir(stage).join(format!("attempt-{}", attempt));
        fs::create_dir_all(&dir)?;
        self.register(stage, &dir);
        Ok(dir)
    }

    /// Track `path` as an intermediate output of `stage`
    pub fn register(&self, stage: StageKind, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut files = self.files.lock();
        let entries = files.entry(stage).or_default();
        if !entries.contains(&path) {
            entries.push(path);
        }
    }

    pub fn registered(&self, stage: StageKind) -> Vec<PathBuf> {
        self.files.lock().get(&stage).cloned().unwrap_or_default()
    }

    pub fn registered_count(&self) -> usize {
        self.files.lock().values().map(Vec::len).sum()
    }

    /// Delete everything `stage` registered so far; returns how many paths
    /// were removed
    pub fn discard(&self, stage: StageKind) -> PhyloResult<usize> {
        let paths = self.files.lock().remove(&stage).unwrap_or_default();
        let mut removed = 0;
        for path in &paths {
            if remove_path(path)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(stage = %stage, removed, "discarded partial outputs");
        }
        Ok(removed)
    }

    pub fn set_status(&self, status: WorkspaceStatus, error_message: Option<String>) {
        {
            let mut metadata = self.metadata.lock();
            metadata.status = status;
            metadata.error_message = error_message;
        }
        if let Err(e) = self.save_metadata() {
            tracing::warn!(workspace = %self.root.display(), "failed to update workspace metadata: {}", e);
        }
    }

    pub fn status(&self) -> WorkspaceStatus {
        self.metadata.lock().status
    }

    pub fn metadata(&self) -> WorkspaceMetadata {
        self.metadata.lock().clone()
    }

    fn save_metadata(&self) -> PhyloResult<()> {
        let metadata = self.metadata.lock().clone();
        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(self.root.join(METADATA_FILE), json)?;
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.lock().is_some()
    }

    /// Remove every registered file and the workspace directory unless
    /// retention was requested. Safe to call more than once; later calls
    /// return the first report.
    pub fn release(&self) -> CleanupReport {
        let mut released = self.released.lock();
        if let Some(report) = released.as_ref() {
            return report.clone();
        }

        let mut report = CleanupReport {
            workspace: self.root.clone(),
            removed_files: 0,
            retained: self.retain,
            errors: Vec::new(),
        };

        if self.retain {
            let status = self.status();
            if status == WorkspaceStatus::Active {
                self.set_status(WorkspaceStatus::Preserved, None);
            }
            tracing::info!(workspace = %self.root.display(), "workspace retained");
        } else {
            let files = std::mem::take(&mut *self.files.lock());
            for path in files.values().flatten() {
                match remove_path(path) {
                    Ok(true) => report.removed_files += 1,
                    Ok(false) => {}
                    Err(e) => report.errors.push(format!("{}: {}", path.display(), e)),
                }
            }
            if self.root.exists() {
                if let Err(e) = fs::remove_dir_all(&self.root) {
                    report.errors.push(format!("{}: {}", self.root.display(), e));
                }
            }
            tracing::debug!(
                workspace = %self.root.display(),
                removed = report.removed_files,
                "workspace released"
            );
        }

        *released = Some(report.clone());
        report
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.is_released() {
            if self.status() == WorkspaceStatus::Active {
                self.set_status(
                    WorkspaceStatus::Failed,
                    Some("workspace dropped before release".to_string()),
                );
            }
            self.release();
        }
    }
}

/// Remove a file or directory; `Ok(false)` when it was already gone
fn remove_path(path: &Path) -> PhyloResult<bool> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
