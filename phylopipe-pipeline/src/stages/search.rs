//! Similarity search stage
//!
//! Runs the configured local tool against a catalogued database. When the
//! database or the tool is missing, or the local run fails, the query goes
//! to the remote service instead, provided the configuration allows it.

use super::StageContext;
use crate::retry::Summarize;
use phylopipe_bio::sequence::common_type;
use phylopipe_bio::{parse_fasta, write_fasta, Sequence};
use phylopipe_core::{
    MoleculeType, PhyloError, PhyloResult, SearchHit, SearchResult, SearchSource, StageKind,
};
use phylopipe_tools::{
    LocalDatabase, LocalDatabaseCatalog, RemoteSearch, RemoteSearchRequest, SearchBackend,
    SearchRequest,
};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Search hits plus what the alignment stage needs to fetch them
#[derive(Debug, Clone)]
pub struct SearchOutput {
    pub query: Vec<Sequence>,
    pub molecule: MoleculeType,
    pub result: SearchResult,
    /// Database the hits came from, for local results
    pub local_database: Option<LocalDatabase>,
}

impl Summarize for SearchOutput {
    fn summary(&self) -> String {
        format!(
            "{} hits from {} ({})",
            self.result.len(),
            self.result.database,
            self.result.source
        )
    }
}

/// Read and check the query file for a search of `molecule` sequences
pub fn load_query(path: &Path, molecule: MoleculeType, method: &str) -> PhyloResult<Vec<Sequence>> {
    if !path.is_file() {
        return Err(PhyloError::config(format!(
            "query file not found: {}",
            path.display()
        )));
    }

    let malformed = |detail: String| {
        PhyloError::parse(format!("malformed query {}: {}", path.display(), detail))
    };

    let sequences = parse_fasta(path).map_err(|e| malformed(e.to_string()))?;
    if sequences.is_empty() {
        return Err(malformed("no sequences".to_string()));
    }
    if let Some(empty) = sequences.iter().find(|s| s.is_empty()) {
        return Err(malformed(format!("sequence '{}' has no residues", empty.id)));
    }

    match common_type(&sequences) {
        None => Err(malformed(
            "mixes protein and nucleotide sequences".to_string(),
        )),
        Some(found) if found != molecule => Err(malformed(format!(
            "{} sequences cannot be searched with {} ({} queries)",
            found, method, molecule
        ))),
        Some(_) => Ok(sequences),
    }
}

pub struct SearchStage<'a> {
    ctx: &'a StageContext<'a>,
    query_path: &'a Path,
    catalog: &'a LocalDatabaseCatalog,
    remote: Option<&'a dyn RemoteSearch>,
}

impl<'a> SearchStage<'a> {
    pub fn new(
        ctx: &'a StageContext<'a>,
        query_path: &'a Path,
        catalog: &'a LocalDatabaseCatalog,
        remote: Option<&'a dyn RemoteSearch>,
    ) -> Self {
        Self {
            ctx,
            query_path,
            catalog,
            remote,
        }
    }

    pub async fn attempt(&self, number: u32) -> PhyloResult<SearchOutput> {
        let config = self.ctx.config;
        let backend = self.ctx.registries.search.resolve(&config.search_method)?;
        let molecule = backend.molecule_type();
        let query = load_query(self.query_path, molecule, backend.name())?;
        let started = Instant::now();

        let database = self.catalog.find(
            &config.search_database,
            molecule,
            backend.database_format(),
        );
        let local_error = match database {
            Some(database) => match self.run_local(&*backend, &database, &query, number).await {
                Ok(hits) => {
                    let result = SearchResult::new(
                        hits,
                        SearchSource::Local,
                        database.name.clone(),
                        started.elapsed(),
                    );
                    return self.finish(query, molecule, result, Some(database));
                }
                Err(err) => {
                    warn!(method = backend.name(), "local search failed: {}", err);
                    err
                }
            },
            None => PhyloError::config(format!(
                "no local {} database named '{}' in the configured search paths",
                backend.database_format(),
                config.search_database
            )),
        };

        let remote = match self.remote {
            Some(remote) if config.allow_remote => remote,
            _ => return Err(local_error),
        };

        info!(
            service = remote.name(),
            database = %config.search_database,
            "falling back to remote search: {}",
            local_error
        );
        let request = RemoteSearchRequest {
            program: backend.remote_program(),
            database: &config.search_database,
            query: &query,
            evalue: config.search_evalue,
            max_hits: config.search_max_hits,
        };
        match remote.search(&request).await {
            Ok(hits) => {
                let result = SearchResult::new(
                    hits,
                    SearchSource::Remote,
                    config.search_database.clone(),
                    started.elapsed(),
                );
                self.finish(query, molecule, result, None)
            }
            Err(err) => {
                warn!(local = %local_error, "remote search failed as well: {}", err);
                Err(err)
            }
        }
    }

    async fn run_local(
        &self,
        backend: &dyn SearchBackend,
        database: &LocalDatabase,
        query: &[Sequence],
        number: u32,
    ) -> PhyloResult<Vec<SearchHit>> {
        let registry = &self.ctx.registries.search;
        if !registry.is_available(backend.name()) {
            return Err(registry.unavailable(backend));
        }

        let config = self.ctx.config;
        let dir = self.ctx.workspace.attempt_dir(StageKind::Search, number)?;
        let query_file = dir.join("query.fasta");
        write_fasta(&query_file, query)?;
        let output = dir.join("hits.tsv");

        let request = SearchRequest {
            query: &query_file,
            database: &database.path,
            output: &output,
            evalue: config.search_evalue,
            max_hits: config.search_max_hits,
            threads: config.search_threads,
        };
        let command = backend.command(&request);
        debug!(command = %command, "running local search");
        self.ctx.runner.run(&command).await?;

        let text = std::fs::read_to_string(&output).map_err(|e| {
            PhyloError::parse(format!(
                "{} left no readable output at {}: {}",
                backend.name(),
                output.display(),
                e
            ))
        })?;
        backend.parse_hits(&text)
    }

    fn finish(
        &self,
        query: Vec<Sequence>,
        molecule: MoleculeType,
        result: SearchResult,
        local_database: Option<LocalDatabase>,
    ) -> PhyloResult<SearchOutput> {
        if result.is_empty() && self.ctx.config.zero_hits_fatal {
            return Err(PhyloError::EmptyResult(format!(
                "{} search against {} returned no hits",
                result.source, result.database
            )));
        }
        if result.is_empty() {
            warn!(database = %result.database, "search returned no hits");
        }

        Ok(SearchOutput {
            query,
            molecule,
            result,
            local_database,
        })
    }
}
