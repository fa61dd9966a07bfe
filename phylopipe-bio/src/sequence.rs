use phylopipe_core::{AlignedRecord, MoleculeType};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub description: Option<String>,
    pub sequence: Vec<u8>,
}

impl Sequence {
    pub fn new(id: String, sequence: Vec<u8>) -> Self {
        Self {
            id,
            description: None,
            sequence,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Residues that only occur in amino acid alphabets decide the type
    pub fn detect_type(&self) -> MoleculeType {
        let protein_chars = b"EFILPQXZ";
        let has_protein = self
            .sequence
            .iter()
            .any(|&c| protein_chars.contains(&c.to_ascii_uppercase()));

        if has_protein {
            MoleculeType::Protein
        } else {
            MoleculeType::Nucleotide
        }
    }

    pub fn header(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!(">{} {}", self.id, desc),
            _ => format!(">{}", self.id),
        }
    }

    /// Convert an aligned FASTA record into an alignment row
    pub fn into_aligned(self) -> AlignedRecord {
        let residues = String::from_utf8_lossy(&self.sequence).into_owned();
        AlignedRecord::new(self.id, residues)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.sequence))
    }
}

/// Molecule type of a set of sequences; `None` when empty or mixed
pub fn common_type(sequences: &[Sequence]) -> Option<MoleculeType> {
    let mut types = sequences.iter().map(Sequence::detect_type);
    let first = types.next()?;
    types.all(|t| t == first).then_some(first)
}
