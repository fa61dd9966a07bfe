//! Runs search, alignment and tree inference in order for one query
//!
//! A run owns one workspace. Whatever happens (success, a fatal stage,
//! exhaustion or cancellation) the workspace is released, the outputs that
//! were produced stay in the output directory and `run_report.json`
//! describes the run.

use crate::cancel::CancelSignal;
use crate::outcome::StageOutcome;
use crate::report::{
    AlignmentSummary, RunOutputs, RunReport, SearchSummary, TreeSummary, ALIGNMENT_FILE,
    RUN_REPORT_FILE, SEARCH_HITS_FILE, TREE_FILE,
};
use crate::retry::{RetryPolicy, StageExecutor, StageReport};
use crate::stages::{AlignmentStage, SearchStage, StageContext, TreeStage};
use phylopipe_bio::{write_fasta, write_hits_tsv, Sequence};
use phylopipe_core::config::validate_methods;
use phylopipe_core::{
    PhyloError, PhyloResult, PipelineConfig, ResourceChecker, ResourceProbe, ResourceSnapshot,
    RunStatus, Settings, StageKind, SystemProbe,
};
use phylopipe_tools::{
    EntrezFetcher, LocalDatabaseCatalog, NcbiBlastClient, ProcessRunner, Registries,
    RemoteSearch, SequenceSource, ToolRunner,
};
use phylopipe_utils::{
    CleanupReport, NullReporter, ProgressEvent, ProgressReporter, Workspace, WorkspaceConfig,
    WorkspaceStatus,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct PipelineRun {
    pub id: String,
    pub query: PathBuf,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
    pub status: RunStatus,
    pub reports: Vec<StageReport>,
    pub elapsed: Duration,
    pub preflight: Option<ResourceSnapshot>,
    pub search: Option<SearchSummary>,
    pub alignment: Option<AlignmentSummary>,
    pub tree: Option<TreeSummary>,
    pub outputs: RunOutputs,
    pub cleanup: CleanupReport,
    pub error: Option<PhyloError>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn exit_code(&self) -> i32 {
        match (&self.status, &self.error) {
            (RunStatus::Succeeded, _) => 0,
            (RunStatus::Cancelled, _) => 130,
            (RunStatus::Failed, Some(err)) => err.exit_code(),
            (RunStatus::Failed, None) => 1,
        }
    }

    pub fn stage_report(&self, stage: StageKind) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }

    /// Total attempts across all stages
    pub fn total_attempts(&self) -> u32 {
        self.reports.iter().map(|r| r.attempts).sum()
    }

    pub fn report(&self) -> RunReport<'_> {
        RunReport::from_run(self)
    }
}

/// What a run has produced so far
#[derive(Default)]
struct RunProgress {
    reports: Vec<StageReport>,
    preflight: Option<ResourceSnapshot>,
    search: Option<SearchSummary>,
    alignment: Option<AlignmentSummary>,
    tree: Option<TreeSummary>,
    outputs: RunOutputs,
}

/// Stage orchestrator with its collaborators
pub struct Pipeline {
    registries: Registries,
    runner: Option<Arc<dyn ToolRunner>>,
    remote: Option<Arc<dyn RemoteSearch>>,
    remote_fetcher: Option<Arc<dyn SequenceSource>>,
    catalog: LocalDatabaseCatalog,
    resources: Arc<dyn ResourceProbe>,
    reporter: Arc<dyn ProgressReporter>,
    workspace: WorkspaceConfig,
    cancel: CancelSignal,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn catalog(&self) -> &LocalDatabaseCatalog {
        &self.catalog
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Run all three stages for `query`, writing results into `output_dir`
    pub async fn run(&self, config: &PipelineConfig, query: &Path, output_dir: &Path) -> PipelineRun {
        let started = Instant::now();
        let label = query.display().to_string();
        self.reporter.report(&ProgressEvent::RunStarted {
            label: label.clone(),
        });

        let mut progress = RunProgress::default();
        let (id, result, cleanup) = match Workspace::create(&self.workspace, &label) {
            Ok(workspace) => {
                info!(run = %workspace.id, query = %label, "starting pipeline run");
                let result = self
                    .execute(config, query, output_dir, &workspace, &mut progress)
                    .await;
                let (status, message) = match &result {
                    Ok(()) => (WorkspaceStatus::Completed, None),
                    Err(PhyloError::Cancelled) => (WorkspaceStatus::Cancelled, None),
                    Err(err) => (WorkspaceStatus::Failed, Some(err.to_string())),
                };
                workspace.set_status(status, message);
                let cleanup = workspace.release();
                if !cleanup.is_clean() {
                    warn!(run = %workspace.id, errors = ?cleanup.errors, "workspace cleanup was incomplete");
                }
                (workspace.id.clone(), result, cleanup)
            }
            Err(err) => (
                phylopipe_core::system::generate_utc_timestamp(),
                Err(err),
                CleanupReport::default(),
            ),
        };

        let status = match &result {
            Ok(()) => RunStatus::Succeeded,
            Err(PhyloError::Cancelled) => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        };

        let mut run = PipelineRun {
            id,
            query: query.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            config: config.clone(),
            status,
            reports: progress.reports,
            elapsed: started.elapsed(),
            preflight: progress.preflight,
            search: progress.search,
            alignment: progress.alignment,
            tree: progress.tree,
            outputs: progress.outputs,
            cleanup,
            error: result.err(),
        };

        let report_path = output_dir.join(RUN_REPORT_FILE);
        run.outputs.report = Some(report_path.clone());
        let written = run.report().write(&report_path);
        if let Err(err) = written {
            warn!(path = %report_path.display(), "could not write run report: {}", err);
            run.outputs.report = None;
        }

        match &run.error {
            None => info!(run = %run.id, elapsed = ?run.elapsed, "pipeline run succeeded"),
            Some(err) => warn!(run = %run.id, status = %run.status, "pipeline run ended: {}", err),
        }
        self.reporter.report(&ProgressEvent::RunFinished {
            status: run.status,
            elapsed: run.elapsed,
        });
        run
    }

    async fn execute(
        &self,
        config: &PipelineConfig,
        query: &Path,
        output_dir: &Path,
        workspace: &Workspace,
        progress: &mut RunProgress,
    ) -> PhyloResult<()> {
        config.validate_bounds()?;
        validate_methods(config, &self.registries)?;
        progress.preflight = Some(ResourceChecker::new(self.resources.as_ref()).check(config)?);
        if self.cancel.is_cancelled() {
            return Err(PhyloError::Cancelled);
        }
        fs::create_dir_all(output_dir)?;

        let runner: Arc<dyn ToolRunner> = match &self.runner {
            Some(runner) => Arc::clone(runner),
            None => Arc::new(ProcessRunner::with_timeout(config.tool_timeout())),
        };
        let ctx = StageContext {
            config,
            registries: &self.registries,
            runner: &runner,
            workspace,
        };
        let executor = StageExecutor::new(
            RetryPolicy::from_config(config),
            &self.cancel,
            self.reporter.as_ref(),
        )
        .with_workspace(workspace);

        // Search
        let stage = &SearchStage::new(&ctx, query, &self.catalog, self.remote.as_deref());
        let (report, result) = executor
            .execute(StageKind::Search, move |n| async move {
                StageOutcome::from_result(stage.attempt(n).await)
            })
            .await;
        progress.reports.push(report);
        let search = result?;
        progress.search = Some(SearchSummary::from(&search.result));
        let path = output_dir.join(SEARCH_HITS_FILE);
        write_hits_tsv(&path, &search.result)?;
        progress.outputs.search_hits = Some(path);

        // Alignment
        let stage = &AlignmentStage::new(&ctx, &search, self.remote_fetcher.as_deref());
        let (report, result) = executor
            .execute(StageKind::Alignment, move |n| async move {
                StageOutcome::from_result(stage.attempt(n).await)
            })
            .await;
        progress.reports.push(report);
        let alignment = result?;
        progress.alignment = Some(AlignmentSummary::from(&alignment));
        let path = output_dir.join(ALIGNMENT_FILE);
        let records: Vec<Sequence> = alignment
            .records
            .iter()
            .map(|r| Sequence::new(r.id.clone(), r.residues.clone().into_bytes()))
            .collect();
        write_fasta(&path, &records)?;
        progress.outputs.alignment = Some(path);

        // Tree
        let stage = &TreeStage::new(&ctx, &alignment, search.molecule);
        let (report, result) = executor
            .execute(StageKind::Tree, move |n| async move {
                StageOutcome::from_result(stage.attempt(n).await)
            })
            .await;
        progress.reports.push(report);
        let tree = result?;
        progress.tree = Some(TreeSummary::from(&tree));
        let path = output_dir.join(TREE_FILE);
        let mut newick = tree.newick.trim_end().to_string();
        newick.push('\n');
        fs::write(&path, newick)?;
        progress.outputs.tree = Some(path);

        Ok(())
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    registries: Option<Registries>,
    runner: Option<Arc<dyn ToolRunner>>,
    remote: Option<Arc<dyn RemoteSearch>>,
    remote_fetcher: Option<Arc<dyn SequenceSource>>,
    catalog: LocalDatabaseCatalog,
    resources: Arc<dyn ResourceProbe>,
    reporter: Arc<dyn ProgressReporter>,
    workspace: WorkspaceConfig,
    cancel: CancelSignal,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            registries: None,
            runner: None,
            remote: None,
            remote_fetcher: None,
            catalog: LocalDatabaseCatalog::default(),
            resources: Arc::new(SystemProbe),
            reporter: Arc::new(NullReporter),
            workspace: WorkspaceConfig::default(),
            cancel: CancelSignal::new(),
        }
    }
}

impl PipelineBuilder {
    /// Remote services, database catalog and workspace root from `settings`
    pub fn from_settings(settings: &Settings) -> PhyloResult<Self> {
        let remote = NcbiBlastClient::from_settings(&settings.remote)?;
        let fetcher = EntrezFetcher::new(
            settings.remote.efetch_endpoint.clone(),
            settings.remote.request_timeout(),
        )?;
        let workspace = WorkspaceConfig {
            root: settings.workspace_root(),
            ..WorkspaceConfig::default()
        };

        Ok(Self::default()
            .remote(Arc::new(remote))
            .remote_fetcher(Arc::new(fetcher))
            .catalog(LocalDatabaseCatalog::discover(&settings.database_dirs()))
            .workspace(workspace))
    }

    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = Some(registries);
        self
    }

    /// Launch tools through `runner` instead of real processes
    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteSearch>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn remote_fetcher(mut self, fetcher: Arc<dyn SequenceSource>) -> Self {
        self.remote_fetcher = Some(fetcher);
        self
    }

    pub fn catalog(mut self, catalog: LocalDatabaseCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn resources(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.resources = probe;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn workspace(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            registries: self.registries.unwrap_or_else(Registries::standard),
            runner: self.runner,
            remote: self.remote,
            remote_fetcher: self.remote_fetcher,
            catalog: self.catalog,
            resources: self.resources,
            reporter: self.reporter,
            workspace: self.workspace,
            cancel: self.cancel,
        }
    }
}
