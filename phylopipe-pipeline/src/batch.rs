//! Many queries through one pipeline, a bounded number at a time

use crate::orchestrator::{Pipeline, PipelineRun};
use crate::retry::serialize_millis;
use futures::stream::{self, StreamExt};
use phylopipe_core::{PhyloResult, PipelineConfig, RunStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

pub const BATCH_REPORT_FILE: &str = "batch_report.json";

pub struct BatchRunner<'a> {
    pipeline: &'a Pipeline,
    workers: usize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(pipeline: &'a Pipeline, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
        }
    }

    /// Run every query into its own subdirectory of `output_dir`
    pub async fn run(
        &self,
        config: &PipelineConfig,
        queries: &[PathBuf],
        output_dir: &Path,
    ) -> BatchOutcome {
        let started = Instant::now();
        let dirs = run_directories(queries, output_dir);
        info!(queries = queries.len(), workers = self.workers, "starting batch");

        let pipeline = self.pipeline;
        let mut runs: Vec<(usize, PipelineRun)> = stream::iter(queries.iter().zip(dirs).enumerate())
            .map(move |(index, (query, dir))| async move {
                (index, pipeline.run(config, query, &dir).await)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        runs.sort_by_key(|(index, _)| *index);

        BatchOutcome {
            runs: runs.into_iter().map(|(_, run)| run).collect(),
            elapsed: started.elapsed(),
        }
    }
}

/// One output directory per query, named after the file stem
pub fn run_directories(queries: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut used = HashSet::new();
    queries
        .iter()
        .map(|query| {
            let stem = query
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "query".to_string());
            let mut name = stem.clone();
            let mut suffix = 2;
            while !used.insert(name.clone()) {
                name = format!("{}_{}", stem, suffix);
                suffix += 1;
            }
            output_dir.join(name)
        })
        .collect()
}

/// Runs of a batch, in input order
#[derive(Debug)]
pub struct BatchOutcome {
    pub runs: Vec<PipelineRun>,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }

    /// 130 if anything was cancelled, else the first failing run's code
    pub fn exit_code(&self) -> i32 {
        if self.runs.iter().any(|r| r.status == RunStatus::Cancelled) {
            return 130;
        }
        self.runs
            .iter()
            .find(|r| !r.succeeded())
            .map(PipelineRun::exit_code)
            .unwrap_or(0)
    }

    pub fn write_report(&self, output_dir: &Path) -> PhyloResult<PathBuf> {
        let entries: Vec<BatchEntry<'_>> = self.runs.iter().map(BatchEntry::from).collect();
        let report = BatchReport {
            total: self.runs.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            exit_code: self.exit_code(),
            elapsed: self.elapsed,
            runs: entries,
        };

        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(BATCH_REPORT_FILE);
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        Ok(path)
    }
}

#[derive(Serialize)]
struct BatchReport<'a> {
    total: usize,
    succeeded: usize,
    failed: usize,
    exit_code: i32,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    elapsed: Duration,
    runs: Vec<BatchEntry<'a>>,
}

#[derive(Serialize)]
struct BatchEntry<'a> {
    run_id: &'a str,
    query: &'a Path,
    output_dir: &'a Path,
    status: RunStatus,
    exit_code: i32,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    elapsed: Duration,
    error: Option<String>,
}

impl<'a> From<&'a PipelineRun> for BatchEntry<'a> {
    fn from(run: &'a PipelineRun) -> Self {
        Self {
            run_id: &run.id,
            query: &run.query,
            output_dir: &run.output_dir,
            status: run.status,
            exit_code: run.exit_code(),
            elapsed: run.elapsed,
            error: run.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_directories_are_unique() {
        let queries = vec![
            PathBuf::from("a/hba.fasta"),
            PathBuf::from("b/hba.fasta"),
            PathBuf::from("b/hbb.fa"),
        ];
        let dirs = run_directories(&queries, Path::new("/out"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/out/hba"),
                PathBuf::from("/out/hba_2"),
                PathBuf::from("/out/hbb"),
            ]
        );
    }
}
