//! Per-stage retry state machine
//!
//! A stage runs as `Pending → Running → {Succeeded | RetryPending | Failed}`,
//! with `Cancelled` reachable from every non-terminal state. Retryable
//! failures wait `base * 2^retry` (capped) and re-enter `Running` until the
//! attempt budget is spent. Partial outputs the stage registered with the
//! workspace are discarded before each retry.

use crate::cancel::CancelSignal;
use crate::outcome::{FailureSummary, OutcomeLabel, StageOutcome, StageState};
use phylopipe_core::{PhyloError, PhyloResult, PipelineConfig, StageKind};
use phylopipe_utils::{ProgressEvent, ProgressReporter, Workspace};
use serde::{Serialize, Serializer};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff schedule of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay(),
            config.retry_max_delay(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (0-based): `base * 2^retry`, capped
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// One-line description of a stage's payload for progress output
pub trait Summarize {
    fn summary(&self) -> String;
}

impl Summarize for () {
    fn summary(&self) -> String {
        String::new()
    }
}

/// Everything the retry wrapper observed for one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: StageKind,
    pub state: StageState,
    /// Outcome of the last attempt
    pub outcome: OutcomeLabel,
    pub attempts: u32,
    #[serde(rename = "waits_ms", serialize_with = "serialize_millis_list")]
    pub waits: Vec<Duration>,
    pub transitions: Vec<StageState>,
    pub failure: Option<FailureSummary>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl StageReport {
    fn new(stage: StageKind) -> Self {
        Self {
            stage,
            state: StageState::Pending,
            outcome: OutcomeLabel::Success,
            attempts: 0,
            waits: Vec::new(),
            transitions: vec![StageState::Pending],
            failure: None,
            elapsed: Duration::ZERO,
        }
    }

    fn enter(&mut self, next: StageState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal stage transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.transitions.push(next);
    }

    pub fn succeeded(&self) -> bool {
        self.state == StageState::Succeeded
    }

    pub fn total_wait(&self) -> Duration {
        self.waits.iter().sum()
    }
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[allow(clippy::ptr_arg)]
fn serialize_millis_list<S: Serializer>(ds: &Vec<Duration>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(ds.iter().map(|d| d.as_millis() as u64))
}

/// Drives a stage through its attempts
pub struct StageExecutor<'a> {
    policy: RetryPolicy,
    cancel: &'a CancelSignal,
    reporter: &'a dyn ProgressReporter,
    workspace: Option<&'a Workspace>,
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        policy: RetryPolicy,
        cancel: &'a CancelSignal,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            policy,
            cancel,
            reporter,
            workspace: None,
        }
    }

    /// Discard the stage's registered files in `workspace` before retries
    pub fn with_workspace(mut self, workspace: &'a Workspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Run `attempt` (called with the 1-based attempt number) until it
    /// succeeds, fails fatally, exhausts the retry budget or is cancelled.
    ///
    /// Failures come back as [`PhyloError::Stage`]; cancellation as
    /// [`PhyloError::Cancelled`].
    pub async fn execute<T, F, Fut>(
        &self,
        stage: StageKind,
        mut attempt: F,
    ) -> (StageReport, PhyloResult<T>)
    where
        T: Summarize,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StageOutcome<T>>,
    {
        let started = Instant::now();
        let mut report = StageReport::new(stage);
        let max_attempts = self.policy.max_attempts();

        loop {
            report.attempts += 1;
            let number = report.attempts;
            report.enter(StageState::Running);
            self.reporter.report(&ProgressEvent::StageStarted {
                stage,
                attempt: number,
            });

            let raced = self
                .cancel
                .guard(async { Ok(attempt(number).await) })
                .await;
            let Ok(outcome) = raced else {
                return self.cancelled(report, started);
            };
            report.outcome = outcome.label();

            match outcome {
                StageOutcome::Success(value) => {
                    report.enter(StageState::Succeeded);
                    report.failure = None;
                    report.elapsed = started.elapsed();
                    self.reporter.report(&ProgressEvent::StageCompleted {
                        stage,
                        attempts: number,
                        elapsed: report.elapsed,
                        summary: value.summary(),
                    });
                    return (report, Ok(value));
                }
                StageOutcome::FatalFailure(err) => {
                    return self.failed(report, started, err, false);
                }
                StageOutcome::RetryableFailure(err) if number >= max_attempts => {
                    return self.failed(report, started, err, true);
                }
                StageOutcome::RetryableFailure(err) => {
                    let wait = self.policy.delay(number - 1);
                    report.enter(StageState::RetryPending);
                    report.waits.push(wait);
                    report.failure = Some(FailureSummary::from(&err));
                    self.reporter.report(&ProgressEvent::StageRetrying {
                        stage,
                        attempt: number,
                        wait,
                        cause: err.to_string(),
                    });

                    if let Some(workspace) = self.workspace {
                        if let Err(e) = workspace.discard(stage) {
                            tracing::warn!(stage = %stage, "could not discard partial outputs: {}", e);
                        }
                    }

                    let slept = self
                        .cancel
                        .guard(async {
                            tokio::time::sleep(wait).await;
                            Ok(())
                        })
                        .await;
                    if slept.is_err() {
                        return self.cancelled(report, started);
                    }
                }
            }
        }
    }

    fn failed<T>(
        &self,
        mut report: StageReport,
        started: Instant,
        err: PhyloError,
        exhausted: bool,
    ) -> (StageReport, PhyloResult<T>) {
        report.enter(StageState::Failed);
        report.elapsed = started.elapsed();
        let summary = FailureSummary::from(&err);
        self.reporter.report(&ProgressEvent::StageFailed {
            stage: report.stage,
            kind: summary.kind,
            attempts: report.attempts,
            cause: summary.cause.clone(),
        });

        let error = PhyloError::Stage {
            stage: report.stage,
            kind: summary.kind,
            attempts: report.attempts,
            cause: summary.cause.clone(),
            exhausted,
        };
        report.failure = Some(summary);
        (report, Err(error))
    }

    fn cancelled<T>(&self, mut report: StageReport, started: Instant) -> (StageReport, PhyloResult<T>) {
        report.enter(StageState::Cancelled);
        report.outcome = OutcomeLabel::Cancelled;
        report.elapsed = started.elapsed();
        report.failure = Some(FailureSummary::from(&PhyloError::Cancelled));
        tracing::info!(stage = %report.stage, attempts = report.attempts, "stage cancelled");
        (report, Err(PhyloError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylopipe_core::ErrorKind;
    use phylopipe_utils::{NullReporter, WorkspaceConfig};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_secs(2), Duration::from_secs(60))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let p = policy(10);
        assert_eq!(p.delay(0), Duration::from_secs(2));
        assert_eq!(p.delay(1), Duration::from_secs(4));
        assert_eq!(p.delay(2), Duration::from_secs(8));
        assert_eq!(p.delay(5), Duration::from_secs(60));
        assert_eq!(p.delay(40), Duration::from_secs(60));
        assert_eq!(p.max_attempts(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let cancel = CancelSignal::new();
        let executor = StageExecutor::new(policy(3), &cancel, &NullReporter);
        let calls = AtomicU32::new(0);

        let started = Instant::now();
        let (report, result) = executor
            .execute(StageKind::Search, |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n <= 2 {
                        StageOutcome::RetryableFailure(PhyloError::transient("connection reset"))
                    } else {
                        StageOutcome::Success(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.waits, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(
            report.transitions,
            vec![
                StageState::Pending,
                StageState::Running,
                StageState::RetryPending,
                StageState::Running,
                StageState::RetryPending,
                StageState::Running,
                StageState::Succeeded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_outputs_discarded_before_retry() {
        let root = TempDir::new().unwrap();
        let workspace = Workspace::create(&WorkspaceConfig::new(root.path()), "retry").unwrap();
        let cancel = CancelSignal::new();
        let executor =
            StageExecutor::new(policy(2), &cancel, &NullReporter).with_workspace(&workspace);

        let first_dir = workspace.stage_dir(StageKind::Alignment).join("attempt-1");
        let partial = first_dir.join("partial.fasta");
        let (report, result) = executor
            .execute(StageKind::Alignment, |n| {
                let workspace = &workspace;
                let first_dir = &first_dir;
                let partial = &partial;
                async move {
                    if n == 1 {
                        let dir = workspace.attempt_dir(StageKind::Alignment, n).unwrap();
                        std::fs::write(dir.join("partial.fasta"), ">seq1\nMKV\n").unwrap();
                        assert!(partial.exists());
                        return StageOutcome::RetryableFailure(PhyloError::transient(
                            "aligner killed",
                        ));
                    }
                    assert!(!partial.exists(), "attempt {} saw a stale partial output", n);
                    assert!(!first_dir.exists());
                    let dir = workspace.attempt_dir(StageKind::Alignment, n).unwrap();
                    assert!(dir.ends_with("attempt-2"));
                    StageOutcome::Success(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(report.attempts, 2);
        assert_eq!(report.state, StageState::Succeeded);
        assert_eq!(
            workspace.registered(StageKind::Alignment),
            vec![workspace.stage_dir(StageKind::Alignment).join("attempt-2")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_everything() {
        let cancel = CancelSignal::new();
        let executor = StageExecutor::new(policy(2), &cancel, &NullReporter);

        let (report, result) = executor
            .execute(StageKind::Alignment, |_| async {
                StageOutcome::<()>::RetryableFailure(PhyloError::transient("timed out"))
            })
            .await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.state, StageState::Failed);
        assert_eq!(report.outcome, OutcomeLabel::RetryableFailure);
        assert!(report.waits.windows(2).all(|w| w[0] < w[1]));

        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.kind(), ErrorKind::TransientExecution);
        assert!(err.to_string().contains("alignment stage failed after 3 attempt(s)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_is_not_retried() {
        let cancel = CancelSignal::new();
        let executor = StageExecutor::new(policy(5), &cancel, &NullReporter);

        let (report, result) = executor
            .execute(StageKind::Tree, |_| async {
                StageOutcome::<()>::FatalFailure(PhyloError::config("model not supported"))
            })
            .await;

        assert_eq!(report.attempts, 1);
        assert!(report.waits.is_empty());
        assert_eq!(result.unwrap_err().exit_code(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_one_attempt() {
        let cancel = CancelSignal::new();
        let executor = StageExecutor::new(policy(0), &cancel, &NullReporter);

        let (report, result) = executor
            .execute(StageKind::Search, |_| async {
                StageOutcome::<()>::RetryableFailure(PhyloError::transient("HTTP 503"))
            })
            .await;

        assert_eq!(report.attempts, 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        let executor = StageExecutor::new(policy(3), &cancel, &NullReporter);
        let (report, result) = executor
            .execute(StageKind::Search, |_| async {
                StageOutcome::<()>::RetryableFailure(PhyloError::transient("timeout"))
            })
            .await;

        assert!(matches!(result, Err(PhyloError::Cancelled)));
        assert_eq!(report.state, StageState::Cancelled);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt() {
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.trigger();
        });

        let executor = StageExecutor::new(policy(3), &cancel, &NullReporter);
        let (report, result) = executor
            .execute(StageKind::Tree, |_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                StageOutcome::Success(())
            })
            .await;

        assert!(matches!(result, Err(PhyloError::Cancelled)));
        assert_eq!(
            report.transitions,
            vec![StageState::Pending, StageState::Running, StageState::Cancelled]
        );
    }
}
