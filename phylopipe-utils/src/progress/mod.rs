/// Stage progress reporting
///
/// The orchestrator emits [`ProgressEvent`]s; reporters decide how they are
/// shown. [`TracingReporter`] turns them into structured log records,
/// [`ConsoleReporter`] draws a spinner per stage for interactive runs.
use crate::output::format_duration;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use phylopipe_core::{ErrorKind, RunStatus, StageKind};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        label: String,
    },
    StageStarted {
        stage: StageKind,
        attempt: u32,
    },
    /// `attempt` failed with a retryable cause; the next one starts after `wait`
    StageRetrying {
        stage: StageKind,
        attempt: u32,
        wait: Duration,
        cause: String,
    },
    StageCompleted {
        stage: StageKind,
        attempts: u32,
        elapsed: Duration,
        summary: String,
    },
    StageFailed {
        stage: StageKind,
        kind: ErrorKind,
        attempts: u32,
        cause: String,
    },
    RunFinished {
        status: RunStatus,
        elapsed: Duration,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { label } => {
                tracing::info!(run = %label, "pipeline started");
            }
            ProgressEvent::StageStarted { stage, attempt } => {
                tracing::info!(stage = %stage, attempt, "stage started");
            }
            ProgressEvent::StageRetrying {
                stage,
                attempt,
                wait,
                cause,
            } => {
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    cause = %cause,
                    "stage failed, retrying"
                );
            }
            ProgressEvent::StageCompleted {
                stage,
                attempts,
                elapsed,
                summary,
            } => {
                tracing::info!(
                    stage = %stage,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    summary = %summary,
                    "stage completed"
                );
            }
            ProgressEvent::StageFailed {
                stage,
                kind,
                attempts,
                cause,
            } => {
                tracing::error!(
                    stage = %stage,
                    kind = %kind,
                    attempts,
                    cause = %cause,
                    "stage failed"
                );
            }
            ProgressEvent::RunFinished { status, elapsed } => {
                tracing::info!(
                    status = %status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "pipeline finished"
                );
            }
        }
    }
}

/// Create a spinner with consistent styling
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Interactive terminal output, one spinner per running stage
#[derive(Default)]
pub struct ConsoleReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage_label(stage: StageKind) -> String {
        format!("[{}/{}] {}", stage.position(), StageKind::ALL.len(), stage)
    }

    fn clear(&self) {
        if let Some(pb) = self.spinner.lock().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { label } => {
                println!("{} {}", "▶".cyan(), label.bold());
            }
            ProgressEvent::StageStarted { stage, attempt } => {
                let mut message = format!("{}...", Self::stage_label(*stage));
                if *attempt > 1 {
                    message.push_str(&format!(" (attempt {})", attempt));
                }
                self.spinner
                    .lock()
                    .get_or_insert_with(|| create_spinner(""))
                    .set_message(message);
            }
            ProgressEvent::StageRetrying {
                stage,
                attempt,
                wait,
                cause,
            } => {
                let line = format!(
                    "{} attempt {} failed: {}; retrying in {}",
                    Self::stage_label(*stage),
                    attempt,
                    cause,
                    format_duration(*wait)
                );
                match self.spinner.lock().as_ref() {
                    Some(pb) => pb.println(format!("{} {}", "⚠".yellow(), line.yellow())),
                    None => eprintln!("{} {}", "⚠".yellow(), line.yellow()),
                }
            }
            ProgressEvent::StageCompleted {
                stage,
                attempts,
                elapsed,
                summary,
            } => {
                self.clear();
                let retries = if *attempts > 1 {
                    format!(", {} attempts", attempts)
                } else {
                    String::new()
                };
                println!(
                    "{} {} {} {}",
                    "✓".green(),
                    Self::stage_label(*stage),
                    summary,
                    format!("({}{})", format_duration(*elapsed), retries).dimmed()
                );
            }
            ProgressEvent::StageFailed {
                stage,
                kind,
                attempts,
                cause,
            } => {
                self.clear();
                eprintln!(
                    "{} {} failed after {} attempt(s) [{}]: {}",
                    "✗".red(),
                    Self::stage_label(*stage),
                    attempts,
                    kind,
                    cause.red()
                );
            }
            ProgressEvent::RunFinished { status, elapsed } => {
                self.clear();
                let text = format!("Pipeline {} in {}", status, format_duration(*elapsed));
                match status {
                    RunStatus::Succeeded => println!("{} {}", "✓".green(), text.green().bold()),
                    RunStatus::Failed => eprintln!("{} {}", "✗".red(), text.red().bold()),
                    RunStatus::Cancelled => eprintln!("{} {}", "⚠".yellow(), text.yellow()),
                }
            }
        }
    }
}

impl Drop for ConsoleReporter {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_label() {
        assert_eq!(ConsoleReporter::stage_label(StageKind::Search), "[1/3] search");
        assert_eq!(ConsoleReporter::stage_label(StageKind::Tree), "[3/3] tree");
    }

    #[test]
    fn test_console_reporter_stage_lifecycle() {
        let reporter = ConsoleReporter::new();
        reporter.report(&ProgressEvent::StageStarted {
            stage: StageKind::Alignment,
            attempt: 1,
        });
        assert!(reporter.spinner.lock().is_some());

        reporter.report(&ProgressEvent::StageStarted {
            stage: StageKind::Alignment,
            attempt: 2,
        });
        reporter.report(&ProgressEvent::StageCompleted {
            stage: StageKind::Alignment,
            attempts: 2,
            elapsed: Duration::from_secs(3),
            summary: "12 records".to_string(),
        });
        assert!(reporter.spinner.lock().is_none());
    }

    #[test]
    fn test_reporters_accept_every_event() {
        let events = vec![
            ProgressEvent::RunStarted {
                label: "q.fasta".to_string(),
            },
            ProgressEvent::StageRetrying {
                stage: StageKind::Search,
                attempt: 1,
                wait: Duration::from_secs(2),
                cause: "timeout".to_string(),
            },
            ProgressEvent::StageFailed {
                stage: StageKind::Tree,
                kind: ErrorKind::Parse,
                attempts: 1,
                cause: "bad newick".to_string(),
            },
            ProgressEvent::RunFinished {
                status: RunStatus::Failed,
                elapsed: Duration::from_millis(40),
            },
        ];
        let reporters: Vec<Box<dyn ProgressReporter>> = vec![
            Box::new(NullReporter),
            Box::new(TracingReporter),
            Box::new(ConsoleReporter::new()),
        ];
        for reporter in &reporters {
            for event in &events {
                reporter.report(event);
            }
        }
    }
}
