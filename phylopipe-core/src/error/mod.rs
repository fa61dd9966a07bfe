//! Core error types for phylopipe
//!
//! Every failure is classified into an [`ErrorKind`] close to where it
//! happens. The retry wrapper only looks at [`PhyloError::is_retryable`].

use crate::types::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure classes of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Resource,
    ToolUnavailable,
    TransientExecution,
    Parse,
    ToolFailed,
    EmptyResult,
    Io,
    Cancelled,
}

impl ErrorKind {
    /// Only transient execution failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientExecution)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Resource => "resource",
            ErrorKind::ToolUnavailable => "tool-unavailable",
            ErrorKind::TransientExecution => "transient-execution",
            ErrorKind::Parse => "parse",
            ErrorKind::ToolFailed => "tool-failed",
            ErrorKind::EmptyResult => "empty-result",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for phylopipe operations
#[derive(Error, Debug)]
pub enum PhyloError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Tool unavailable: {tool} is not installed ({hint})")]
    ToolUnavailable { tool: String, hint: String },

    #[error("Transient execution error: {0}")]
    Transient(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{stage} stage failed after {attempts} attempt(s) [{kind}]: {cause}")]
    Stage {
        stage: StageKind,
        kind: ErrorKind,
        attempts: u32,
        cause: String,
        exhausted: bool,
    },
}

/// Result type alias for phylopipe operations
pub type PhyloResult<T> = Result<T, PhyloError>;

impl PhyloError {
    pub fn config(message: impl Into<String>) -> Self {
        PhyloError::Configuration(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        PhyloError::Parse(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        PhyloError::Transient(message.into())
    }

    /// Classify this error into the pipeline taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhyloError::Configuration(_) => ErrorKind::Configuration,
            PhyloError::Resource(_) => ErrorKind::Resource,
            PhyloError::ToolUnavailable { .. } => ErrorKind::ToolUnavailable,
            PhyloError::Transient(_) => ErrorKind::TransientExecution,
            PhyloError::Parse(_) => ErrorKind::Parse,
            PhyloError::ToolFailed { .. } => ErrorKind::ToolFailed,
            PhyloError::EmptyResult(_) => ErrorKind::EmptyResult,
            PhyloError::Io(e) if is_transient_io(e.kind()) => ErrorKind::TransientExecution,
            PhyloError::Io(_) => ErrorKind::Io,
            PhyloError::Cancelled => ErrorKind::Cancelled,
            PhyloError::Stage { kind, .. } => *kind,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            PhyloError::Stage {
                exhausted: true, ..
            } => 4,
            other => match other.kind() {
                ErrorKind::Configuration | ErrorKind::ToolUnavailable => 2,
                ErrorKind::Resource => 3,
                ErrorKind::Cancelled => 130,
                ErrorKind::Parse
                | ErrorKind::ToolFailed
                | ErrorKind::EmptyResult
                | ErrorKind::TransientExecution => 5,
                ErrorKind::Io => 1,
            },
        }
    }
}

fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        kind,
        TimedOut | Interrupted | ConnectionReset | ConnectionAborted | BrokenPipe | WouldBlock
    )
}

impl From<serde_json::Error> for PhyloError {
    fn from(err: serde_json::Error) -> Self {
        PhyloError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for PhyloError {
    fn from(err: toml::de::Error) -> Self {
        PhyloError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let config_error = PhyloError::config("missing field");
        assert_eq!(format!("{}", config_error), "Configuration error: missing field");

        let parse_error = PhyloError::parse("bad newick");
        assert_eq!(format!("{}", parse_error), "Parsing error: bad newick");

        let unavailable = PhyloError::ToolUnavailable {
            tool: "mafft".to_string(),
            hint: "brew install mafft".to_string(),
        };
        assert_eq!(
            format!("{}", unavailable),
            "Tool unavailable: mafft is not installed (brew install mafft)"
        );

        let cancelled = PhyloError::Cancelled;
        assert_eq!(format!("{}", cancelled), "Operation cancelled");
    }

    #[test]
    fn test_stage_error_names_everything() {
        let err = PhyloError::Stage {
            stage: StageKind::Alignment,
            kind: ErrorKind::TransientExecution,
            attempts: 4,
            cause: "connection reset".to_string(),
            exhausted: true,
        };
        let text = err.to_string();
        assert!(text.contains("alignment"));
        assert!(text.contains("4 attempt"));
        assert!(text.contains("transient-execution"));
        assert!(text.contains("connection reset"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(PhyloError::transient("timeout").is_retryable());
        assert!(!PhyloError::config("x").is_retryable());
        assert!(!PhyloError::Resource("x".into()).is_retryable());
        assert!(!PhyloError::parse("x").is_retryable());
        assert!(!PhyloError::Cancelled.is_retryable());
        assert!(!PhyloError::ToolUnavailable {
            tool: "raxml".into(),
            hint: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_io_error_classification() {
        let reset: PhyloError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert_eq!(reset.kind(), ErrorKind::TransientExecution);

        let denied: PhyloError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(denied.kind(), ErrorKind::Io);
        assert!(!denied.is_retryable());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let config = PhyloError::config("x").exit_code();
        let resource = PhyloError::Resource("x".into()).exit_code();
        let exhausted = PhyloError::Stage {
            stage: StageKind::Search,
            kind: ErrorKind::TransientExecution,
            attempts: 3,
            cause: "timeout".into(),
            exhausted: true,
        }
        .exit_code();
        assert_eq!(config, 2);
        assert_eq!(resource, 3);
        assert_eq!(exhausted, 4);
        assert_eq!(PhyloError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse_result: Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{invalid json}");
        let err: PhyloError = parse_result.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
