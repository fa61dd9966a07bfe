//! Discovery of locally installed search databases

use phylopipe_core::MoleculeType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseFormat {
    /// `makeblastdb` output (`.pin/.psq`, `.nin/.nsq`, `.pal/.nal` aliases)
    Blast,
    /// `diamond makedb` output (`.dmnd`)
    Diamond,
}

impl fmt::Display for DatabaseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseFormat::Blast => f.write_str("blast"),
            DatabaseFormat::Diamond => f.write_str("diamond"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalDatabase {
    pub name: String,
    /// Path prefix passed to the search tool
    pub path: PathBuf,
    pub molecule: MoleculeType,
    pub format: DatabaseFormat,
}

fn classify(extension: &str) -> Option<(DatabaseFormat, MoleculeType)> {
    match extension {
        "pin" | "psq" | "pal" => Some((DatabaseFormat::Blast, MoleculeType::Protein)),
        "nin" | "nsq" | "nal" => Some((DatabaseFormat::Blast, MoleculeType::Nucleotide)),
        "dmnd" => Some((DatabaseFormat::Diamond, MoleculeType::Protein)),
        _ => None,
    }
}

/// `swissprot.00` → `swissprot`
fn volume_base(stem: &str) -> &str {
    match stem.rsplit_once('.') {
        Some((base, volume)) if !volume.is_empty() && volume.bytes().all(|b| b.is_ascii_digit()) => {
            base
        }
        _ => stem,
    }
}

/// Databases found in a set of directories, first directory wins
#[derive(Debug, Clone, Default)]
pub struct LocalDatabaseCatalog {
    databases: Vec<LocalDatabase>,
}

impl LocalDatabaseCatalog {
    pub fn discover(dirs: &[PathBuf]) -> Self {
        let mut found: BTreeMap<(String, DatabaseFormat, MoleculeType), LocalDatabase> =
            BTreeMap::new();

        for dir in dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "skipping database directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let (Some(stem), Some(ext)) = (
                    path.file_stem().and_then(|s| s.to_str()),
                    path.extension().and_then(|s| s.to_str()),
                ) else {
                    continue;
                };
                let Some((format, molecule)) = classify(ext) else {
                    continue;
                };

                let name = volume_base(stem).to_string();
                found
                    .entry((name.clone(), format, molecule))
                    .or_insert_with(|| LocalDatabase {
                        path: dir.join(&name),
                        name,
                        molecule,
                        format,
                    });
            }
        }

        let databases: Vec<LocalDatabase> = found.into_values().collect();
        tracing::debug!(count = databases.len(), "discovered local databases");
        Self { databases }
    }

    pub fn from_databases(databases: Vec<LocalDatabase>) -> Self {
        Self { databases }
    }

    /// Find a database by name, or by explicit path prefix
    pub fn find(
        &self,
        name: &str,
        molecule: MoleculeType,
        format: DatabaseFormat,
    ) -> Option<LocalDatabase> {
        if let Some(db) = self
            .databases
            .iter()
            .find(|db| db.name == name && db.molecule == molecule && db.format == format)
        {
            return Some(db.clone());
        }

        if name.contains(std::path::MAIN_SEPARATOR) {
            return Self::probe_prefix(Path::new(name), molecule, format);
        }
        None
    }

    fn probe_prefix(prefix: &Path, molecule: MoleculeType, format: DatabaseFormat) -> Option<LocalDatabase> {
        let extensions: &[&str] = match (format, molecule) {
            (DatabaseFormat::Blast, MoleculeType::Protein) => &["pin", "pal"],
            (DatabaseFormat::Blast, MoleculeType::Nucleotide) => &["nin", "nal"],
            (DatabaseFormat::Diamond, MoleculeType::Protein) => &["dmnd"],
            (DatabaseFormat::Diamond, MoleculeType::Nucleotide) => &[],
        };
        let exists = extensions
            .iter()
            .any(|ext| prefix.with_extension(ext).is_file());
        exists.then(|| LocalDatabase {
            name: prefix
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: prefix.to_path_buf(),
            molecule,
            format,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalDatabase> {
        self.databases.iter()
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_discover_blast_and_diamond() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "swissprot.00.pin");
        touch(dir.path(), "swissprot.00.psq");
        touch(dir.path(), "swissprot.pal");
        touch(dir.path(), "nt.nal");
        touch(dir.path(), "swissprot.dmnd");
        touch(dir.path(), "README.txt");

        let catalog = LocalDatabaseCatalog::discover(&[dir.path().to_path_buf()]);
        assert_eq!(catalog.len(), 3);

        let sp = catalog
            .find("swissprot", MoleculeType::Protein, DatabaseFormat::Blast)
            .unwrap();
        assert_eq!(sp.path, dir.path().join("swissprot"));

        assert!(catalog
            .find("swissprot", MoleculeType::Nucleotide, DatabaseFormat::Blast)
            .is_none());
        assert!(catalog
            .find("swissprot", MoleculeType::Protein, DatabaseFormat::Diamond)
            .is_some());
        assert!(catalog
            .find("nt", MoleculeType::Nucleotide, DatabaseFormat::Blast)
            .is_some());
    }

    #[test]
    fn test_first_directory_wins_and_missing_dirs_skipped() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch(a.path(), "pdb.pin");
        touch(b.path(), "pdb.pin");

        let catalog = LocalDatabaseCatalog::discover(&[
            PathBuf::from("/nonexistent/phylopipe/dbs"),
            a.path().to_path_buf(),
            b.path().to_path_buf(),
        ]);
        let db = catalog
            .find("pdb", MoleculeType::Protein, DatabaseFormat::Blast)
            .unwrap();
        assert_eq!(db.path, a.path().join("pdb"));
    }

    #[test]
    fn test_explicit_prefix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "custom.pin");
        let prefix = dir.path().join("custom");

        let catalog = LocalDatabaseCatalog::default();
        let db = catalog
            .find(
                prefix.to_str().unwrap(),
                MoleculeType::Protein,
                DatabaseFormat::Blast,
            )
            .unwrap();
        assert_eq!(db.name, "custom");
        assert_eq!(db.path, prefix);
    }
}
