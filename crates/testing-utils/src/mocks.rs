//! Test doubles for dispatcher collaborators.

use std::sync::Arc;

use parking_lot::Mutex;
use taskpool_dispatcher::{ErrorSink, TaskFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    pub worker: String,
    pub message: String,
    pub panicked: bool,
}

/// Error sink that keeps every report for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    failures: Arc<Mutex<Vec<RecordedFailure>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.failures.lock().len()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, worker: &str, failure: &TaskFailure) {
        let message = match failure {
            TaskFailure::Error(e) => e.to_string(),
            TaskFailure::Panic(message) => message.clone(),
        };
        self.failures.lock().push(RecordedFailure {
            worker: worker.to_string(),
            message,
            panicked: failure.is_panic(),
        });
    }
}
