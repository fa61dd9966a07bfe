//! Typed results of a single stage attempt

use phylopipe_core::{ErrorKind, PhyloError, PhyloResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What one attempt of a stage produced
#[derive(Debug)]
pub enum StageOutcome<T> {
    Success(T),
    RetryableFailure(PhyloError),
    FatalFailure(PhyloError),
}

impl<T> StageOutcome<T> {
    /// Classify a stage result by its error kind
    pub fn from_result(result: PhyloResult<T>) -> Self {
        match result {
            Ok(value) => StageOutcome::Success(value),
            Err(err) if err.is_retryable() => StageOutcome::RetryableFailure(err),
            Err(err) => StageOutcome::FatalFailure(err),
        }
    }

    pub fn label(&self) -> OutcomeLabel {
        match self {
            StageOutcome::Success(_) => OutcomeLabel::Success,
            StageOutcome::RetryableFailure(_) => OutcomeLabel::RetryableFailure,
            StageOutcome::FatalFailure(_) => OutcomeLabel::FatalFailure,
        }
    }

    pub fn error(&self) -> Option<&PhyloError> {
        match self {
            StageOutcome::Success(_) => None,
            StageOutcome::RetryableFailure(err) | StageOutcome::FatalFailure(err) => Some(err),
        }
    }
}

/// Payload-free form of [`StageOutcome`] kept in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Success,
    RetryableFailure,
    FatalFailure,
    Cancelled,
}

/// Lifecycle of a stage under the retry wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Running,
    RetryPending,
    Succeeded,
    Failed,
    Cancelled,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageState::Succeeded | StageState::Failed | StageState::Cancelled
        )
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(&self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Succeeded)
                | (Running, RetryPending)
                | (Running, Failed)
                | (Running, Cancelled)
                | (RetryPending, Running)
                | (RetryPending, Cancelled)
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::RetryPending => "retry-pending",
            StageState::Succeeded => "succeeded",
            StageState::Failed => "failed",
            StageState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Error kind and message of a failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub kind: ErrorKind,
    pub cause: String,
}

impl From<&PhyloError> for FailureSummary {
    fn from(err: &PhyloError) -> Self {
        Self {
            kind: err.kind(),
            cause: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_classifies() {
        assert_eq!(
            StageOutcome::from_result(Ok::<_, PhyloError>(1)).label(),
            OutcomeLabel::Success
        );
        assert_eq!(
            StageOutcome::<()>::from_result(Err(PhyloError::transient("timeout"))).label(),
            OutcomeLabel::RetryableFailure
        );
        assert_eq!(
            StageOutcome::<()>::from_result(Err(PhyloError::config("bad model"))).label(),
            OutcomeLabel::FatalFailure
        );
        assert_eq!(
            StageOutcome::<()>::from_result(Err(PhyloError::parse("bad newick"))).label(),
            OutcomeLabel::FatalFailure
        );
    }

    #[test]
    fn test_transitions() {
        use StageState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(RetryPending));
        assert!(RetryPending.can_transition_to(Running));
        assert!(!Succeeded.can_transition_to(Running));
        assert!(!Failed.can_transition_to(RetryPending));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(Failed.is_terminal() && Cancelled.is_terminal() && !RetryPending.is_terminal());
    }
}
