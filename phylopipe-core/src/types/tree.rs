use crate::error::{PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};

/// A phylogenetic tree in Newick form with its leaf set and branch supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeResult {
    pub newick: String,
    pub leaves: Vec<String>,
    /// One entry per internal (non-root) branch
    pub supports: Vec<Option<f64>>,
    pub bootstrap_replicates: u32,
}

impl TreeResult {
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Check leaf count and, when bootstrapped, support coverage and range
    pub fn validate(&self, expected_leaves: usize) -> PhyloResult<()> {
        if self.leaves.len() != expected_leaves {
            return Err(PhyloError::parse(format!(
                "tree has {} leaves but the alignment has {} records",
                self.leaves.len(),
                expected_leaves
            )));
        }

        if self.bootstrap_replicates > 0 {
            for (index, support) in self.supports.iter().enumerate() {
                match support {
                    Some(value) if (0.0..=100.0).contains(value) => {}
                    Some(value) => {
                        return Err(PhyloError::parse(format!(
                            "internal branch {} has support {} outside [0, 100]",
                            index, value
                        )))
                    }
                    None => {
                        return Err(PhyloError::parse(format!(
                            "internal branch {} has no bootstrap support",
                            index
                        )))
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(leaves: &[&str], supports: Vec<Option<f64>>, bootstrap: u32) -> TreeResult {
        TreeResult {
            newick: String::new(),
            leaves: leaves.iter().map(|s| s.to_string()).collect(),
            supports,
            bootstrap_replicates: bootstrap,
        }
    }

    #[test]
    fn test_leaf_count_must_match() {
        assert!(tree(&["a", "b"], vec![], 0).validate(2).is_ok());
        assert!(tree(&["a", "b"], vec![], 0).validate(3).is_err());
    }

    #[test]
    fn test_supports_required_with_bootstrap() {
        let t = tree(&["a", "b", "c", "d"], vec![Some(98.0)], 100);
        assert!(t.validate(4).is_ok());

        let missing = tree(&["a", "b", "c", "d"], vec![None], 100);
        assert!(missing.validate(4).is_err());

        let out_of_range = tree(&["a", "b", "c", "d"], vec![Some(250.0)], 100);
        assert!(out_of_range.validate(4).is_err());

        // Without bootstrap, unlabeled branches are fine
        assert!(tree(&["a", "b", "c", "d"], vec![None], 0).validate(4).is_ok());
    }
}
