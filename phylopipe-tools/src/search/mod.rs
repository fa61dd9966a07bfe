//! Similarity search backends

pub mod databases;

pub use databases::{DatabaseFormat, LocalDatabase, LocalDatabaseCatalog};

use crate::traits::{Backend, SearchBackend, SearchRequest};
use crate::types::ToolCommand;
use phylopipe_bio::formats::tabular::PIPELINE_FIELDS;
use phylopipe_core::MoleculeType;

/// BLAST+ `blastp` / `blastn`
#[derive(Debug, Clone, Copy)]
pub struct BlastSearch {
    program: &'static str,
    molecule: MoleculeType,
}

impl BlastSearch {
    pub fn blastp() -> Self {
        Self {
            program: "blastp",
            molecule: MoleculeType::Protein,
        }
    }

    pub fn blastn() -> Self {
        Self {
            program: "blastn",
            molecule: MoleculeType::Nucleotide,
        }
    }
}

impl Backend for BlastSearch {
    fn name(&self) -> &'static str {
        self.program
    }

    fn binary(&self) -> &'static str {
        self.program
    }

    fn install_hint(&self) -> &'static str {
        "conda install -c bioconda blast  (or: brew install blast)"
    }

    fn description(&self) -> &'static str {
        match self.molecule {
            MoleculeType::Protein => "BLAST+ protein search",
            MoleculeType::Nucleotide => "BLAST+ nucleotide search",
        }
    }
}

impl SearchBackend for BlastSearch {
    fn molecule_type(&self) -> MoleculeType {
        self.molecule
    }

    fn database_format(&self) -> DatabaseFormat {
        DatabaseFormat::Blast
    }

    fn remote_program(&self) -> &'static str {
        self.program
    }

    fn command(&self, request: &SearchRequest<'_>) -> ToolCommand {
        ToolCommand::new(self.program)
            .opt("-query", request.query)
            .opt("-db", request.database)
            .opt("-out", request.output)
            .opt("-outfmt", format!("6 {}", PIPELINE_FIELDS))
            .opt("-evalue", request.evalue.to_string())
            .opt("-max_target_seqs", request.max_hits.to_string())
            .opt("-num_threads", request.threads.to_string())
            .output(request.output)
    }
}

/// DIAMOND protein search against a `.dmnd` database
#[derive(Debug, Clone, Copy, Default)]
pub struct DiamondSearch;

impl Backend for DiamondSearch {
    fn name(&self) -> &'static str {
        "diamond"
    }

    fn binary(&self) -> &'static str {
        "diamond"
    }

    fn install_hint(&self) -> &'static str {
        "conda install -c bioconda diamond  (or: brew install diamond)"
    }

    fn description(&self) -> &'static str {
        "DIAMOND accelerated protein search"
    }
}

impl SearchBackend for DiamondSearch {
    fn molecule_type(&self) -> MoleculeType {
        MoleculeType::Protein
    }

    fn database_format(&self) -> DatabaseFormat {
        DatabaseFormat::Diamond
    }

    fn remote_program(&self) -> &'static str {
        "blastp"
    }

    fn command(&self, request: &SearchRequest<'_>) -> ToolCommand {
        ToolCommand::new("diamond")
            .arg("blastp")
            .opt("--query", request.query)
            .opt("--db", request.database)
            .opt("--out", request.output)
            .arg("--outfmt")
            .arg("6")
            .args(PIPELINE_FIELDS.split_whitespace())
            .opt("--evalue", request.evalue.to_string())
            .opt("--max-target-seqs", request.max_hits.to_string())
            .opt("--threads", request.threads.to_string())
            .output(request.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request<'a>() -> SearchRequest<'a> {
        SearchRequest {
            query: Path::new("/work/query.fasta"),
            database: Path::new("/db/swissprot"),
            output: Path::new("/work/hits.tsv"),
            evalue: 1e-5,
            max_hits: 100,
            threads: 4,
        }
    }

    #[test]
    fn test_blastp_command() {
        let cmd = BlastSearch::blastp().command(&request());
        assert_eq!(cmd.program, "blastp");
        assert_eq!(cmd.arg_value("-db").as_deref(), Some("/db/swissprot"));
        assert_eq!(cmd.arg_value("-evalue").as_deref(), Some("0.00001"));
        assert_eq!(cmd.arg_value("-max_target_seqs").as_deref(), Some("100"));
        assert_eq!(cmd.arg_value("-num_threads").as_deref(), Some("4"));
        assert!(cmd.arg_value("-outfmt").unwrap().starts_with("6 qseqid sseqid"));
        assert!(cmd.writes(Path::new("/work/hits.tsv")));
    }

    #[test]
    fn test_diamond_command() {
        let cmd = DiamondSearch.command(&request());
        assert_eq!(cmd.arg_strings()[0], "blastp");
        assert_eq!(cmd.arg_value("--threads").as_deref(), Some("4"));
        assert_eq!(cmd.arg_value("--outfmt").as_deref(), Some("6"));
        assert!(cmd.has_arg("bitscore"));
        assert_eq!(DiamondSearch.remote_program(), "blastp");
    }
}
