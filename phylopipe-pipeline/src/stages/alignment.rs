//! Multiple sequence alignment stage
//!
//! Gathers the query plus the full sequences of the best hits, then aligns
//! them with the configured tool. Hit sequences come out of the local BLAST
//! database when the search ran locally, otherwise from the remote source.

use super::search::SearchOutput;
use super::{sanitize_ids, StageContext};
use crate::retry::Summarize;
use phylopipe_bio::{parse_fasta, write_fasta, Sequence};
use phylopipe_core::{AlignmentResult, PhyloError, PhyloResult, SearchSource, StageKind};
use phylopipe_tools::{
    accession_of, AlignmentRequest, BlastDbFetcher, DatabaseFormat, SequenceSource,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

impl Summarize for AlignmentResult {
    fn summary(&self) -> String {
        format!(
            "{} records, {} columns, {:.1}% gaps",
            self.len(),
            self.length,
            self.gap_fraction * 100.0
        )
    }
}

pub struct AlignmentStage<'a> {
    ctx: &'a StageContext<'a>,
    search: &'a SearchOutput,
    remote_fetcher: Option<&'a dyn SequenceSource>,
}

impl<'a> AlignmentStage<'a> {
    pub fn new(
        ctx: &'a StageContext<'a>,
        search: &'a SearchOutput,
        remote_fetcher: Option<&'a dyn SequenceSource>,
    ) -> Self {
        Self {
            ctx,
            search,
            remote_fetcher,
        }
    }

    /// Hit ids to fetch, excluding the query's own entries
    fn target_ids(&self) -> Vec<String> {
        let query_ids: HashSet<&str> = self
            .search
            .query
            .iter()
            .flat_map(|s| [s.id.as_str(), accession_of(&s.id)])
            .collect();
        self.search
            .result
            .target_ids(self.ctx.config.search_max_hits)
            .into_iter()
            .filter(|id| !query_ids.contains(id.as_str()) && !query_ids.contains(accession_of(id)))
            .collect()
    }

    pub async fn attempt(&self, number: u32) -> PhyloResult<AlignmentResult> {
        let config = self.ctx.config;
        let registry = &self.ctx.registries.alignment;
        let backend = registry.resolve(&config.alignment_method)?;

        let targets = self.target_ids();
        let expected = self.search.query.len() + targets.len();
        if expected < 2 {
            return Err(PhyloError::EmptyResult(format!(
                "alignment needs at least 2 sequences but the search left {}",
                expected
            )));
        }

        if !registry.is_available(backend.name()) {
            return Err(registry.unavailable(&*backend));
        }

        let fetched = self.fetch(&targets).await?;
        let mut records = self.assemble(&targets, fetched);
        if records.len() < expected {
            warn!(
                requested = targets.len(),
                aligned = records.len(),
                "some hit sequences could not be retrieved"
            );
        }
        if records.len() < 2 {
            return Err(PhyloError::EmptyResult(format!(
                "only {} sequence(s) available to align",
                records.len()
            )));
        }
        sanitize_ids(&mut records);

        let dir = self.ctx.workspace.attempt_dir(StageKind::Alignment, number)?;
        let input = dir.join("input.fasta");
        write_fasta(&input, &records)?;
        let output = dir.join("aligned.fasta");

        let request = AlignmentRequest {
            input: &input,
            output: &output,
            work_dir: &dir,
            threads: config.alignment_threads,
        };
        let command = backend.command(&request);
        debug!(command = %command, records = records.len(), "running aligner");
        self.ctx.runner.run(&command).await?;

        let aligned = parse_fasta(&output).map_err(|e| {
            PhyloError::parse(format!("{} output is unreadable: {}", backend.name(), e))
        })?;
        if aligned.len() != records.len() {
            return Err(PhyloError::parse(format!(
                "{} returned {} records for {} input sequences",
                backend.name(),
                aligned.len(),
                records.len()
            )));
        }

        AlignmentResult::from_records(aligned.into_iter().map(Sequence::into_aligned).collect())
    }

    async fn fetch(&self, targets: &[String]) -> PhyloResult<Vec<Sequence>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let molecule = self.search.molecule;

        match (&self.search.result.source, &self.search.local_database) {
            (SearchSource::Local, Some(database)) if database.format == DatabaseFormat::Blast => {
                let fetcher = BlastDbFetcher::new(Arc::clone(self.ctx.runner), database.path.clone());
                fetcher.fetch(targets, molecule).await
            }
            _ => match self.remote_fetcher {
                Some(source) => source.fetch(targets, molecule).await,
                None => Err(PhyloError::config(
                    "hit sequences must be fetched remotely but no remote sequence source is configured",
                )),
            },
        }
    }

    /// Query first, then fetched hits in search order, without duplicates
    fn assemble(&self, targets: &[String], fetched: Vec<Sequence>) -> Vec<Sequence> {
        let mut by_accession: HashMap<String, Sequence> = HashMap::new();
        for sequence in fetched.into_iter().filter(|s| !s.is_empty()) {
            by_accession
                .entry(accession_of(&sequence.id).to_string())
                .or_insert(sequence);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::with_capacity(self.search.query.len() + by_accession.len());
        for sequence in &self.search.query {
            if seen.insert(accession_of(&sequence.id).to_string()) {
                records.push(sequence.clone());
            }
        }
        for target in targets {
            let accession = accession_of(target);
            if seen.contains(accession) {
                continue;
            }
            if let Some(sequence) = by_accession.remove(accession) {
                seen.insert(accession.to_string());
                records.push(sequence);
            }
        }
        records
    }
}
