//! Sequence and file-format handling for phylopipe

pub mod formats;
pub mod sequence;

// Re-export commonly used types
pub use sequence::Sequence;
// Re-export format functions
pub use formats::fasta::{parse_fasta, parse_fasta_from_bytes, write_fasta};
pub use formats::newick::{parse_newick, tree_from_newick, NewickNode};
pub use formats::tabular::{parse_tabular, write_hits_tsv, TabularLayout};
