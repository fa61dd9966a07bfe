pub mod fasta;
pub mod newick;
pub mod tabular;
