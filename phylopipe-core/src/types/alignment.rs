use crate::error::{PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};

/// One row of a multiple sequence alignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedRecord {
    pub id: String,
    pub residues: String,
}

impl AlignedRecord {
    pub fn new(id: impl Into<String>, residues: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            residues: residues.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// A validated alignment: all records share one non-zero column count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub records: Vec<AlignedRecord>,
    pub length: usize,
    pub gap_fraction: f64,
}

impl AlignmentResult {
    pub fn from_records(records: Vec<AlignedRecord>) -> PhyloResult<Self> {
        let first = records
            .first()
            .ok_or_else(|| PhyloError::parse("alignment contains no records"))?;
        let length = first.len();
        if length == 0 {
            return Err(PhyloError::parse(format!(
                "aligned record '{}' is empty",
                first.id
            )));
        }

        if let Some(bad) = records.iter().find(|r| r.len() != length) {
            return Err(PhyloError::parse(format!(
                "aligned record '{}' has {} columns, expected {}",
                bad.id,
                bad.len(),
                length
            )));
        }

        let gaps: usize = records
            .iter()
            .map(|r| r.residues.bytes().filter(|&b| b == b'-' || b == b'.').count())
            .sum();
        let gap_fraction = gaps as f64 / (length * records.len()) as f64;

        Ok(Self {
            records,
            length,
            gap_fraction,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}
