//! Progress reporter that keeps every event

use parking_lot::Mutex;
use phylopipe_core::StageKind;
use phylopipe_utils::{ProgressEvent, ProgressReporter};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Attempts started for `stage`
    pub fn starts(&self, stage: StageKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::StageStarted { stage: s, .. } if *s == stage))
            .count()
    }

    /// Backoff waits announced for `stage`, in order
    pub fn waits(&self, stage: StageKind) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StageRetrying { stage: s, wait, .. } if *s == stage => Some(*wait),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}
