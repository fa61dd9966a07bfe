//! BLAST tabular output (`-outfmt 6`)
//!
//! Three column layouts are understood, picked per line by column count:
//! the 12-column BLAST default, the 10-column layout phylopipe asks local
//! tools for ([`PIPELINE_FIELDS`]), and the 6-column summary that
//! [`write_hits_tsv`] produces.

use phylopipe_core::{PhyloError, PhyloResult, SearchHit, SearchResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Field list passed to `-outfmt 6` / `--outfmt 6`
pub const PIPELINE_FIELDS: &str =
    "qseqid sseqid pident length evalue bitscore qstart qend sstart send";

/// Columns of the summary file written to the output directory
pub const SUMMARY_COLUMNS: [&str; 6] = [
    "query_id",
    "target_id",
    "identity",
    "alignment_length",
    "evalue",
    "score",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularLayout {
    /// qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore
    Standard,
    /// [`PIPELINE_FIELDS`]
    Pipeline,
    /// [`SUMMARY_COLUMNS`]
    Summary,
}

impl TabularLayout {
    pub fn from_columns(columns: usize) -> Option<Self> {
        match columns {
            12 => Some(TabularLayout::Standard),
            10 => Some(TabularLayout::Pipeline),
            6 => Some(TabularLayout::Summary),
            _ => None,
        }
    }
}

/// Parse tabular search output; comment and blank lines are skipped.
/// Hits are returned in file order.
pub fn parse_tabular(text: &str) -> PhyloResult<Vec<SearchHit>> {
    let mut hits = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let layout = TabularLayout::from_columns(fields.len()).ok_or_else(|| {
            PhyloError::parse(format!(
                "line {}: unexpected column count {} in tabular search output",
                index + 1,
                fields.len()
            ))
        })?;

        hits.push(
            parse_row(&fields, layout)
                .map_err(|e| PhyloError::parse(format!("line {}: {}", index + 1, e)))?,
        );
    }

    Ok(hits)
}

fn parse_row(fields: &[&str], layout: TabularLayout) -> Result<SearchHit, String> {
    fn num<T: std::str::FromStr>(fields: &[&str], index: usize, name: &str) -> Result<T, String> {
        fields[index]
            .parse::<T>()
            .map_err(|_| format!("invalid {} '{}'", name, fields[index]))
    }

    let (evalue_col, score_col, coords) = match layout {
        TabularLayout::Standard => (10, 11, Some(6)),
        TabularLayout::Pipeline => (4, 5, Some(6)),
        TabularLayout::Summary => (4, 5, None),
    };

    let (query_start, query_end, target_start, target_end) = match coords {
        Some(c) => (
            num(fields, c, "qstart")?,
            num(fields, c + 1, "qend")?,
            num(fields, c + 2, "sstart")?,
            num(fields, c + 3, "send")?,
        ),
        None => (0, 0, 0, 0),
    };

    Ok(SearchHit {
        query_id: fields[0].to_string(),
        target_id: fields[1].to_string(),
        identity: num(fields, 2, "identity")?,
        alignment_length: num(fields, 3, "alignment length")?,
        evalue: num(fields, evalue_col, "e-value")?,
        score: num(fields, score_col, "bit score")?,
        query_start,
        query_end,
        target_start,
        target_end,
    })
}

/// Write the ordered hit table with a provenance comment
pub fn write_hits_tsv<P: AsRef<Path>>(path: P, result: &SearchResult) -> PhyloResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_hits_to_writer(&mut writer, result)?;
    writer.flush()?;
    Ok(())
}

pub fn write_hits_to_writer<W: Write>(writer: &mut W, result: &SearchResult) -> PhyloResult<()> {
    writeln!(
        writer,
        "# source: {}  database: {}  hits: {}",
        result.source,
        result.database,
        result.len()
    )?;
    writeln!(writer, "# {}", SUMMARY_COLUMNS.join("\t"))?;
    for hit in &result.hits {
        writeln!(
            writer,
            "{}\t{}\t{:.2}\t{}\t{:e}\t{:.1}",
            hit.query_id, hit.target_id, hit.identity, hit.alignment_length, hit.evalue, hit.score
        )?;
    }
    Ok(())
}
