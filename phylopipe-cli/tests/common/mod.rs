#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HBB_QUERY: &str = ">query1 hemoglobin beta fragment\nMVHLTPEEKSAVTALWGKVNVDEVGGEALGRLLV\n";

/// Same length as [`HBB_QUERY`] so the fake aligner can pass records through
pub const HBA_ENTRY: &str = ">sp|P69905.2|HBA_HUMAN Hemoglobin subunit alpha\nMVLSPADKTNVKAAWGKVGAHAGEYGAEALERMF\n";

/// Isolated home, workspace root and settings for one CLI invocation
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let env = Self {
            temp_dir: TempDir::new()?,
        };
        fs::create_dir_all(env.databases_dir())?;
        fs::create_dir_all(env.workspace_root())?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn databases_dir(&self) -> PathBuf {
        self.path().join("databases")
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.path().join("workspaces")
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub fn create_input_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Empty volume files; enough for discovery
    pub fn add_protein_database(&self, name: &str) -> Result<()> {
        for ext in ["pin", "psq", "phr"] {
            fs::write(self.databases_dir().join(format!("{}.{}", name, ext)), b"")?;
        }
        Ok(())
    }

    pub fn write_settings(&self) -> Result<PathBuf> {
        let settings = format!(
            "[databases]\ndirs = [\"{}\"]\n\n[workspace]\nroot = \"{}\"\n",
            self.databases_dir().display(),
            self.workspace_root().display()
        );
        self.create_input_file("config.toml", &settings)
    }

    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.workspace_root())
            .map(|entries| entries.flatten().count())
            .unwrap_or(0)
    }

    /// `phylopipe` with every setting pointed into the temp dir
    pub fn command(&self) -> Command {
        let mut cmd = phylopipe_cmd();
        cmd.env("PHYLOPIPE_HOME", self.path())
            .env("PHYLOPIPE_DATABASES_DIR", self.databases_dir())
            .env("PHYLOPIPE_WORKSPACE_DIR", self.workspace_root())
            .env_remove("PHYLOPIPE_CONFIG")
            .env_remove("PHYLOPIPE_LOG")
            .env_remove("PHYLOPIPE_KEEP_WORKSPACE")
            .env_remove("BLASTDB");
        cmd
    }
}

pub fn phylopipe_cmd() -> Command {
    Command::cargo_bin("phylopipe").unwrap()
}

pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Shell stand-ins for blastp, blastdbcmd, mafft and FastTree
#[cfg(unix)]
pub mod fake_tools {
    use anyhow::Result;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    const BLASTP: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -out) out="$2"; shift ;;
  esac
  shift
done
printf 'query1\tsp|P69905.2|HBA_HUMAN\t43.5\t34\t1e-10\t50.1\t1\t34\t1\t34\n' > "$out"
"#;

    const MAFFT: &str = r#"#!/bin/sh
for last; do :; done
cat "$last"
"#;

    const FASTTREE: &str = r#"#!/bin/sh
out=""
while [ $# -gt 1 ]; do
  if [ "$1" = "-out" ]; then out="$2"; shift; fi
  shift
done
leaves=$(grep '^>' "$1" | cut -c2- | cut -d' ' -f1 | sed 's/$/:0.1/' | paste -sd, -)
printf '(%s);\n' "$leaves" > "$out"
"#;

    fn install(dir: &Path, name: &str, script: &str) -> Result<()> {
        let path = dir.join(name);
        fs::write(&path, script)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    /// Write the scripts into `dir` and return a PATH with `dir` first
    pub fn install_all(dir: &Path, blastdbcmd_output: &str) -> Result<String> {
        fs::create_dir_all(dir)?;
        install(dir, "blastp", BLASTP)?;
        install(
            dir,
            "blastdbcmd",
            &format!("#!/bin/sh\ncat <<'EOF'\n{}EOF\n", blastdbcmd_output),
        )?;
        install(dir, "mafft", MAFFT)?;
        install(dir, "FastTree", FASTTREE)?;

        let mut paths: Vec<PathBuf> = vec![dir.to_path_buf()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        Ok(std::env::join_paths(paths)?.to_string_lossy().into_owned())
    }
}
