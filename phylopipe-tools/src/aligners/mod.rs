//! Multiple sequence alignment backends
//!
//! All aligners read an unaligned FASTA file and leave aligned FASTA at
//! `request.output`.

use crate::traits::{AlignmentBackend, AlignmentRequest, Backend};
use crate::types::ToolCommand;

#[derive(Debug, Clone, Copy, Default)]
pub struct Mafft;

impl Backend for Mafft {
    fn name(&self) -> &'static str {
        "mafft"
    }

    fn binary(&self) -> &'static str {
        "mafft"
    }

    fn install_hint(&self) -> &'static str {
        "brew install mafft  (or: conda install -c bioconda mafft)"
    }

    fn description(&self) -> &'static str {
        "MAFFT, automatic strategy selection"
    }
}

impl AlignmentBackend for Mafft {
    fn command(&self, request: &AlignmentRequest<'_>) -> ToolCommand {
        ToolCommand::new("mafft")
            .arg("--auto")
            .arg("--quiet")
            .opt("--thread", request.threads.to_string())
            .arg(request.input)
            .stdout_to(request.output)
    }
}

/// MUSCLE 3.8 command line
#[derive(Debug, Clone, Copy, Default)]
pub struct Muscle;

impl Backend for Muscle {
    fn name(&self) -> &'static str {
        "muscle"
    }

    fn binary(&self) -> &'static str {
        "muscle"
    }

    fn install_hint(&self) -> &'static str {
        "brew install muscle  (or: conda install -c bioconda muscle=3.8)"
    }

    fn description(&self) -> &'static str {
        "MUSCLE, two refinement iterations"
    }
}

impl AlignmentBackend for Muscle {
    // Single threaded
    fn command(&self, request: &AlignmentRequest<'_>) -> ToolCommand {
        ToolCommand::new("muscle")
            .opt("-in", request.input)
            .opt("-out", request.output)
            .opt("-maxiters", "2")
            .arg("-quiet")
            .output(request.output)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClustalOmega;

impl Backend for ClustalOmega {
    fn name(&self) -> &'static str {
        "clustalo"
    }

    fn binary(&self) -> &'static str {
        "clustalo"
    }

    fn install_hint(&self) -> &'static str {
        "brew install clustal-omega  (or: conda install -c bioconda clustalo)"
    }

    fn description(&self) -> &'static str {
        "Clustal Omega"
    }
}

impl AlignmentBackend for ClustalOmega {
    fn command(&self, request: &AlignmentRequest<'_>) -> ToolCommand {
        ToolCommand::new("clustalo")
            .opt("-i", request.input)
            .opt("-o", request.output)
            .arg("--outfmt=fasta")
            .arg(format!("--threads={}", request.threads))
            .arg("--force")
            .output(request.output)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TCoffee;

impl Backend for TCoffee {
    fn name(&self) -> &'static str {
        "t_coffee"
    }

    fn binary(&self) -> &'static str {
        "t_coffee"
    }

    fn install_hint(&self) -> &'static str {
        "conda install -c bioconda t-coffee"
    }

    fn description(&self) -> &'static str {
        "T-Coffee consistency-based alignment"
    }
}

impl AlignmentBackend for TCoffee {
    fn command(&self, request: &AlignmentRequest<'_>) -> ToolCommand {
        // Guide tree and log files land in the working directory
        ToolCommand::new("t_coffee")
            .arg(request.input)
            .opt("-output", "fasta_aln")
            .opt("-outfile", request.output)
            .opt("-n_core", request.threads.to_string())
            .arg("-quiet")
            .current_dir(request.work_dir)
            .output(request.output)
            .output(request.work_dir)
    }
}
