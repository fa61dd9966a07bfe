//! Test environment management
//!
//! Provides an isolated directory tree per test with automatic cleanup:
//! query files, fake local databases, a workspace root and output
//! directories.

use anyhow::{Context, Result};
use phylopipe_bio::{write_fasta, Sequence};
use phylopipe_core::MoleculeType;
use phylopipe_tools::LocalDatabaseCatalog;
use phylopipe_utils::WorkspaceConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test environment with automatic cleanup
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("phylopipe-test")
            .context("Failed to create temporary directory")?;

        for subdir in ["queries", "databases", "workspace", "output"] {
            fs::create_dir_all(temp_dir.path().join(subdir))?;
        }

        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `sequences` as `queries/<name>`
    pub fn write_query(&self, name: &str, sequences: &[Sequence]) -> Result<PathBuf> {
        let path = self.path().join("queries").join(name);
        write_fasta(&path, sequences).with_context(|| format!("writing query {}", name))?;
        Ok(path)
    }

    /// Write arbitrary text as `queries/<name>`
    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join("queries").join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn databases_dir(&self) -> PathBuf {
        self.path().join("databases")
    }

    /// Lay down empty volume files so the catalog sees a BLAST database
    pub fn add_blast_database(&self, name: &str, molecule: MoleculeType) -> Result<PathBuf> {
        let prefix = self.databases_dir().join(name);
        let extensions: &[&str] = match molecule {
            MoleculeType::Protein => &["pin", "psq", "phr"],
            MoleculeType::Nucleotide => &["nin", "nsq", "nhr"],
        };
        for ext in extensions {
            fs::write(prefix.with_extension(ext), b"")?;
        }
        Ok(prefix)
    }

    pub fn catalog(&self) -> LocalDatabaseCatalog {
        LocalDatabaseCatalog::discover(&[self.databases_dir()])
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.path().join("workspace")
    }

    pub fn workspace_config(&self) -> WorkspaceConfig {
        WorkspaceConfig::new(self.workspace_root())
    }

    /// Directories still present under the workspace root
    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.workspace_root())
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }

    /// Output directory for one run; created by the pipeline
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.path().join("output").join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::hemoglobin_query;

    #[test]
    fn test_environment_layout() {
        let env = TestEnvironment::new().unwrap();
        let query = env.write_query("q.fasta", &hemoglobin_query()).unwrap();
        assert!(query.is_file());
        assert!(env.workspace_root().is_dir());
        assert_eq!(env.leftover_workspaces(), 0);
    }

    #[test]
    fn test_fake_database_is_discovered() {
        let env = TestEnvironment::new().unwrap();
        env.add_blast_database("swissprot", MoleculeType::Protein).unwrap();
        let catalog = env.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.iter().next().unwrap().name, "swissprot");
    }
}
