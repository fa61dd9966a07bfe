//! Search, alignment and tree inference as one retried, cancellable run
//!
//! [`Pipeline`] runs the three stages in order, each under a
//! [`StageExecutor`] that retries transient failures with exponential
//! backoff. [`BatchRunner`] feeds many queries through the same pipeline.

pub mod batch;
pub mod cancel;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod retry;
pub mod stages;

pub use batch::{run_directories, BatchOutcome, BatchRunner, BATCH_REPORT_FILE};
pub use cancel::CancelSignal;
pub use orchestrator::{Pipeline, PipelineBuilder, PipelineRun};
pub use outcome::{FailureSummary, OutcomeLabel, StageOutcome, StageState};
pub use report::{
    RunOutputs, RunReport, ALIGNMENT_FILE, RUN_REPORT_FILE, SEARCH_HITS_FILE, TREE_FILE,
};
pub use retry::{RetryPolicy, StageExecutor, StageReport, Summarize};
pub use stages::{load_query, SearchOutput};
