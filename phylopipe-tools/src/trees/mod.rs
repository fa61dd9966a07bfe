//! Phylogenetic tree backends

use crate::traits::{Backend, TreeBackend, TreeRequest};
use crate::types::ToolCommand;
use phylopipe_core::MoleculeType;
use std::path::PathBuf;

/// Run name used for tool output prefixes
const RUN_NAME: &str = "phylopipe";

/// FastTree approximate maximum likelihood; no bootstrap resampling
#[derive(Debug, Clone, Copy, Default)]
pub struct FastTree;

impl Backend for FastTree {
    fn name(&self) -> &'static str {
        "fasttree"
    }

    fn binary(&self) -> &'static str {
        "FastTree"
    }

    fn install_hint(&self) -> &'static str {
        "brew install fasttree  (or: conda install -c bioconda fasttree)"
    }

    fn description(&self) -> &'static str {
        "FastTree approximate maximum likelihood"
    }
}

impl TreeBackend for FastTree {
    fn supported_models(&self) -> &'static [&'static str] {
        &["JTT", "WAG", "LG"]
    }

    fn supports_bootstrap(&self) -> bool {
        false
    }

    fn command(&self, request: &TreeRequest<'_>) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.binary())
            .env("OMP_NUM_THREADS", request.threads.to_string())
            .arg("-quiet");

        // protein model names do not apply to nucleotides; GTR is the only
        // rate model FastTree offers beyond its JC default
        match (request.molecule, self.find_model(request.model)) {
            (MoleculeType::Nucleotide, _) => cmd = cmd.arg("-nt").arg("-gtr"),
            (MoleculeType::Protein, Some("WAG")) => cmd = cmd.arg("-wag"),
            (MoleculeType::Protein, Some("LG")) => cmd = cmd.arg("-lg"),
            // JTT is the FastTree default for proteins
            (MoleculeType::Protein, _) => {}
        }

        let tree = self.tree_file(request);
        cmd.opt("-out", &tree).arg(request.alignment).output(tree)
    }

    fn tree_file(&self, request: &TreeRequest<'_>) -> PathBuf {
        request.work_dir.join("tree.nwk")
    }
}

/// RAxML 8, rapid bootstrap plus best ML tree via `-f a`
#[derive(Debug, Clone, Copy, Default)]
pub struct Raxml;

impl Backend for Raxml {
    fn name(&self) -> &'static str {
        "raxml"
    }

    fn binary(&self) -> &'static str {
        "raxmlHPC-PTHREADS"
    }

    fn install_hint(&self) -> &'static str {
        "brew install raxml  (or: conda install -c bioconda raxml)"
    }

    fn description(&self) -> &'static str {
        "RAxML maximum likelihood with rapid bootstrap"
    }
}

impl TreeBackend for Raxml {
    fn supported_models(&self) -> &'static [&'static str] {
        &["PROTGAMMAJTT", "PROTGAMMAWAG", "PROTGAMMALG", "GTRGAMMA"]
    }

    fn supports_bootstrap(&self) -> bool {
        true
    }

    fn command(&self, request: &TreeRequest<'_>) -> ToolCommand {
        let model = self.find_model(request.model).unwrap_or(request.model);
        let mut cmd = ToolCommand::new(self.binary())
            .opt("-T", request.threads.to_string())
            .opt("-m", model)
            .opt("-p", request.seed.to_string())
            .opt("-s", request.alignment)
            .opt("-n", RUN_NAME)
            .opt("-w", request.work_dir);

        if request.bootstrap_replicates > 0 {
            cmd = cmd
                .opt("-f", "a")
                .opt("-x", request.seed.to_string())
                .opt("-N", request.bootstrap_replicates.to_string());
        }

        cmd.output(request.work_dir)
    }

    fn tree_file(&self, request: &TreeRequest<'_>) -> PathBuf {
        if request.bootstrap_replicates > 0 {
            request
                .work_dir
                .join(format!("RAxML_bipartitions.{}", RUN_NAME))
        } else {
            request.work_dir.join(format!("RAxML_bestTree.{}", RUN_NAME))
        }
    }
}

/// IQ-TREE 2; ultrafast bootstrap from 1000 replicates, standard below
#[derive(Debug, Clone, Copy, Default)]
pub struct IqTree;

/// Smallest replicate count IQ-TREE accepts for ultrafast bootstrap
const UFBOOT_MIN: u32 = 1000;

impl Backend for IqTree {
    fn name(&self) -> &'static str {
        "iqtree"
    }

    fn binary(&self) -> &'static str {
        "iqtree2"
    }

    fn install_hint(&self) -> &'static str {
        "brew install iqtree2  (or: conda install -c bioconda iqtree)"
    }

    fn description(&self) -> &'static str {
        "IQ-TREE maximum likelihood"
    }
}

impl TreeBackend for IqTree {
    fn supported_models(&self) -> &'static [&'static str] {
        &["JTT", "LG", "WAG", "GTR"]
    }

    fn supports_bootstrap(&self) -> bool {
        true
    }

    fn command(&self, request: &TreeRequest<'_>) -> ToolCommand {
        let model = self.find_model(request.model).unwrap_or(request.model);
        let mut cmd = ToolCommand::new(self.binary())
            .opt("-s", request.alignment)
            .opt("-m", model)
            .opt("-T", request.threads.to_string())
            .opt("-seed", request.seed.to_string())
            .opt("-pre", request.work_dir.join(RUN_NAME))
            .arg("-quiet")
            .arg("-redo");

        match request.bootstrap_replicates {
            0 => {}
            n if n >= UFBOOT_MIN => cmd = cmd.opt("-B", n.to_string()),
            n => cmd = cmd.opt("-b", n.to_string()),
        }

        cmd.output(request.work_dir)
    }

    fn tree_file(&self, request: &TreeRequest<'_>) -> PathBuf {
        request.work_dir.join(format!("{}.treefile", RUN_NAME))
    }
}
