use tracing::error;

use crate::task::TaskFailure;

/// Receives every task failure. Called on the thread that ran the task
/// (a worker, or the submitter under `caller_runs`).
pub trait ErrorSink: Send + Sync {
    fn report(&self, worker: &str, failure: &TaskFailure);
}

/// Default sink: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, worker: &str, failure: &TaskFailure) {
        match failure {
            TaskFailure::Error(e) => {
                error!(worker = worker, "Task failed: {:#}", e);
            }
            TaskFailure::Panic(message) => {
                error!(worker = worker, "Task panicked: {}", message);
            }
        }
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&str, &TaskFailure) + Send + Sync,
{
    fn report(&self, worker: &str, failure: &TaskFailure) {
        self(worker, failure)
    }
}
