//! Tree inference stage

use super::StageContext;
use crate::retry::Summarize;
use phylopipe_bio::{tree_from_newick, write_fasta, Sequence};
use phylopipe_core::{
    AlignmentResult, MoleculeType, PhyloError, PhyloResult, StageKind, TreeResult,
};
use phylopipe_tools::TreeRequest;
use tracing::debug;

/// Fixed seed so repeated runs infer the same tree
pub const TREE_SEED: u64 = 12345;

impl Summarize for TreeResult {
    fn summary(&self) -> String {
        if self.bootstrap_replicates > 0 {
            format!(
                "{} leaves, {} bootstrap replicates",
                self.leaf_count(),
                self.bootstrap_replicates
            )
        } else {
            format!("{} leaves", self.leaf_count())
        }
    }
}

pub struct TreeStage<'a> {
    ctx: &'a StageContext<'a>,
    alignment: &'a AlignmentResult,
    molecule: MoleculeType,
}

impl<'a> TreeStage<'a> {
    pub fn new(
        ctx: &'a StageContext<'a>,
        alignment: &'a AlignmentResult,
        molecule: MoleculeType,
    ) -> Self {
        Self {
            ctx,
            alignment,
            molecule,
        }
    }

    pub async fn attempt(&self, number: u32) -> PhyloResult<TreeResult> {
        let config = self.ctx.config;
        let registry = &self.ctx.registries.tree;
        let backend = registry.resolve(&config.tree_method)?;

        let dir = self.ctx.workspace.attempt_dir(StageKind::Tree, number)?;
        let alignment_file = dir.join("alignment.fasta");
        let mut request = TreeRequest {
            alignment: &alignment_file,
            work_dir: &dir,
            model: &config.tree_model,
            molecule: self.molecule,
            bootstrap_replicates: config.bootstrap_replicates,
            threads: config.tree_threads,
            seed: TREE_SEED,
        };
        backend.check_request(&request)?;
        if let Some(canonical) = backend.find_model(&config.tree_model) {
            request.model = canonical;
        }

        if !registry.is_available(backend.name()) {
            return Err(registry.unavailable(&*backend));
        }

        let records: Vec<Sequence> = self
            .alignment
            .records
            .iter()
            .map(|r| Sequence::new(r.id.clone(), r.residues.clone().into_bytes()))
            .collect();
        write_fasta(&alignment_file, &records)?;

        let command = backend.command(&request);
        debug!(command = %command, leaves = records.len(), "running tree inference");
        self.ctx.runner.run(&command).await?;

        let tree_file = backend.tree_file(&request);
        let text = std::fs::read_to_string(&tree_file).map_err(|e| {
            PhyloError::parse(format!(
                "{} left no tree at {}: {}",
                backend.name(),
                tree_file.display(),
                e
            ))
        })?;

        let tree = tree_from_newick(&text, config.bootstrap_replicates)?;
        tree.validate(self.alignment.len())?;
        Ok(tree)
    }
}
