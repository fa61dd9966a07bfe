//! Test fixtures and data generators
//!
//! A small hemoglobin family: one human alpha-globin query, a handful of
//! orthologous database entries and the hits a search would report for them.

use phylopipe_bio::Sequence;
use phylopipe_core::SearchHit;

const HBA_HUMAN: &str = "MVLSPADKTNVKAAWGKVGAHAGEYGAEALERMFLSFPTTKTYFPHFDLSHGSAQVKGHGKKVADALTNAVAHVDDMPNALSALSDLHAHKLRVDPVNFKLLSHCLLVTLAAHLPAEFTPAVHASLDKFLASVSTVLTSKYR";
const HBA_MOUSE: &str = "MVLSGEDKSNIKAAWGKIGGHGAEYGAEALERMFASFPTTKTYFPHFDVSHGSAQVKGHGKKVADALASAAGHLDDLPGALSALSDLHAHKLRVDPVNFKLLSHCLLVTLASHHPADFTPAVHASLDKFLASVSTVLTSKYR";
const HBA_CHICK: &str = "MVLSAADKNNVKGIFTKIAGHAEEYGAETLERMFTTYPPTKTYFPHFDLSHGSAQIKGHGKKVVAALIEAANHIDDIAGTLSKLSDLHAHKLRVDPVNFKLLGQCFLVVVAIHHPAALTPEVHASLDKFLCAVGTVLTAKYR";
const HBA_HORSE: &str = "MVLSAADKTNVKAAWSKVGGHAGEYGAEALERMFLGFPTTKTYFPHFDLSHGSAQVKAHGKKVGDALTLAVGHLDDLPGALSNLSDLHAHKLRVDPVNFKLLSHCLLSTLAVHLPNDFTPAVHASLDKFLSSVSTVLTSKYR";
const HBB_HUMAN: &str = "MVHLTPEEKSAVTALWGKVNVDEVGGEALGRLLVVYPWTQRFFESFGDLSTPDAVMGNPKVKAHGKKVLGAFSDGLAHLDNLKGTFATLSELHCDKLHVDPENFRLLGNVLVCVLAHHFGKEFTPPVQAAYQKVVAGVANALAHKYH";

/// Single protein query sequence
pub fn hemoglobin_query() -> Vec<Sequence> {
    vec![Sequence::new(
        "query_HBA".to_string(),
        HBA_HUMAN.as_bytes().to_vec(),
    )
    .with_description("hemoglobin subunit alpha".to_string())]
}

/// Two unrelated-enough protein queries
pub fn two_sequence_query() -> Vec<Sequence> {
    vec![
        Sequence::new("seqA".to_string(), HBA_HUMAN.as_bytes().to_vec()),
        Sequence::new("seqB".to_string(), HBB_HUMAN.as_bytes().to_vec()),
    ]
}

/// Database entries matching [`hemoglobin_hits`]
pub fn hemoglobin_library() -> Vec<Sequence> {
    [
        ("sp|P01942.2|HBA_MOUSE", HBA_MOUSE),
        ("sp|P01994.2|HBA_CHICK", HBA_CHICK),
        ("sp|P01958.2|HBA_HORSE", HBA_HORSE),
        ("sp|P68871.2|HBB_HUMAN", HBB_HUMAN),
    ]
    .iter()
    .map(|(id, residues)| Sequence::new(id.to_string(), residues.as_bytes().to_vec()))
    .collect()
}

/// Build a hit with plausible coordinates
pub fn hit(query: &str, target: &str, identity: f64, evalue: f64) -> SearchHit {
    SearchHit {
        query_id: query.to_string(),
        target_id: target.to_string(),
        identity,
        alignment_length: 141,
        evalue,
        score: 300.0 - evalue.abs().log10().abs().min(100.0),
        query_start: 1,
        query_end: 141,
        target_start: 1,
        target_end: 141,
    }
}

/// Hits of the hemoglobin query, deliberately out of order
pub fn hemoglobin_hits() -> Vec<SearchHit> {
    vec![
        hit("query_HBA", "sp|P68871.2|HBB_HUMAN", 43.0, 3e-40),
        hit("query_HBA", "sp|P01942.2|HBA_MOUSE", 85.2, 5e-85),
        hit("query_HBA", "sp|P01958.2|HBA_HORSE", 87.9, 5e-85),
        hit("query_HBA", "sp|P01994.2|HBA_CHICK", 69.5, 1e-70),
    ]
}

/// Every query hitting itself, which the alignment stage must collapse
pub fn self_hits(query: &[Sequence]) -> Vec<SearchHit> {
    query
        .iter()
        .map(|s| hit(&s.id, &s.id, 100.0, 1e-90))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylopipe_core::MoleculeType;

    #[test]
    fn test_fixtures_are_protein() {
        for seq in hemoglobin_query().iter().chain(hemoglobin_library().iter()) {
            assert_eq!(seq.detect_type(), MoleculeType::Protein);
        }
    }

    #[test]
    fn test_every_hit_is_in_library() {
        let library = hemoglobin_library();
        for hit in hemoglobin_hits() {
            assert!(library.iter().any(|s| s.id == hit.target_id));
        }
    }
}
