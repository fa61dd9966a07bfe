//! Process execution
//!
//! Dropping a running future kills the child process, so callers cancel a
//! tool simply by abandoning the `run` future.

use crate::types::{ToolCommand, ToolOutput};
use async_trait::async_trait;
use phylopipe_core::{PhyloError, PhyloResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// stderr fragments that indicate a failure worth retrying
const TRANSIENT_MARKERS: &[&str] = &[
    "resource temporarily unavailable",
    "temporary failure",
    "try again",
    "connection reset",
    "connection refused",
    "timed out",
    "broken pipe",
    "interrupted system call",
    "too many open files",
];

/// Bytes of stderr kept in error messages
const STDERR_TAIL: usize = 2000;

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `command` to completion; non-zero exits are classified errors
    async fn run(&self, command: &ToolCommand) -> PhyloResult<ToolOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> PhyloResult<ToolOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        match &command.stdout_path {
            Some(path) => {
                let file = std::fs::File::create(path)?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        tracing::debug!(command = %command, "launching tool");
        let started = Instant::now();

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PhyloError::ToolUnavailable {
                    tool: command.program.clone(),
                    hint: "executable not found on PATH".to_string(),
                }
            } else {
                PhyloError::Io(e)
            }
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    PhyloError::transient(format!(
                        "{} timed out after {}s",
                        command.program,
                        limit.as_secs()
                    ))
                })??,
            None => child.wait_with_output().await?,
        };

        let duration = started.elapsed();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::warn!(
                program = %command.program,
                status = ?output.status.code(),
                elapsed_ms = duration.as_millis() as u64,
                "tool exited unsuccessfully"
            );
            return Err(classify_exit(&command.program, output.status.code(), &stderr));
        }

        tracing::debug!(
            program = %command.program,
            elapsed_ms = duration.as_millis() as u64,
            "tool finished"
        );

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr,
            duration,
        })
    }
}

/// Map an unsuccessful exit to an error kind.
///
/// Killed by a signal or stderr with a transient marker: retryable.
/// Anything else: the tool rejected its input and will do so again.
pub fn classify_exit(program: &str, code: Option<i32>, stderr: &str) -> PhyloError {
    let tail = stderr_tail(stderr);

    let Some(code) = code else {
        return PhyloError::transient(format!("{} was terminated by a signal: {}", program, tail));
    };

    let lowered = stderr.to_ascii_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return PhyloError::transient(format!("{} exited with code {}: {}", program, code, tail));
    }

    PhyloError::ToolFailed {
        tool: program.to_string(),
        status: format!("exit code {}", code),
        stderr: tail,
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
