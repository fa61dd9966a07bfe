//! The three pipeline stages
//!
//! Each stage exposes `attempt(n)`, one self-contained try that writes into
//! its own workspace attempt directory and classifies its own failures. The
//! retry wrapper decides whether another attempt follows.

pub mod alignment;
pub mod search;
pub mod tree;

pub use alignment::AlignmentStage;
pub use search::{load_query, SearchOutput, SearchStage};
pub use tree::TreeStage;

use phylopipe_bio::Sequence;
use phylopipe_core::PipelineConfig;
use phylopipe_tools::{Registries, ToolRunner};
use phylopipe_utils::Workspace;
use std::collections::HashSet;
use std::sync::Arc;

/// Collaborators every stage needs for one run
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub registries: &'a Registries,
    pub runner: &'a Arc<dyn ToolRunner>,
    pub workspace: &'a Workspace,
}

/// Characters that break Newick or tool command lines
const RESERVED: &[char] = &['(', ')', ',', ':', ';', '[', ']', '\'', '"', '|', ' ', '\t'];

/// Identifier safe to hand to alignment and tree tools
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "seq".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize ids in place, suffixing `_2`, `_3`... where two collapse together
pub fn sanitize_ids(sequences: &mut [Sequence]) {
    let mut seen = HashSet::new();
    for sequence in sequences.iter_mut() {
        let base = sanitize_id(&sequence.id);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        sequence.id = candidate;
        sequence.description = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("sp|P69905.2|HBA_HUMAN"), "sp_P69905.2_HBA_HUMAN");
        assert_eq!(sanitize_id("ref|XP_016797339.1|"), "ref_XP_016797339.1");
        assert_eq!(sanitize_id("seq(1):a"), "seq_1__a");
        assert_eq!(sanitize_id("|||"), "seq");
    }

    #[test]
    fn test_sanitize_ids_keeps_them_unique() {
        let mut sequences = vec![
            Sequence::new("a|b".to_string(), b"MK".to_vec()),
            Sequence::new("a:b".to_string(), b"MK".to_vec()),
            Sequence::new("a_b".to_string(), b"MK".to_vec()),
        ];
        sanitize_ids(&mut sequences);
        let ids: Vec<&str> = sequences.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a_b", "a_b_2", "a_b_3"]);
    }
}
