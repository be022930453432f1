use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Return types a task closure may produce.
///
/// `()` always succeeds; `Result<(), E>` reports `Err` to the error sink.
pub trait IntoOutcome {
    fn into_outcome(self) -> anyhow::Result<()>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> IntoOutcome for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// An opaque, argument-less unit of work.
pub struct Task {
    job: Job,
}

impl Task {
    pub fn new<F, R>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoOutcome,
    {
        Self {
            job: Box::new(move || f().into_outcome()),
        }
    }

    /// Runs the task inside a panic boundary.
    pub(crate) fn run(self) -> Result<(), TaskFailure> {
        match panic::catch_unwind(AssertUnwindSafe(self.job)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(TaskFailure::Error(error)),
            Err(payload) => Err(TaskFailure::Panic(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Why a task did not complete normally.
#[derive(Debug)]
pub enum TaskFailure {
    Error(anyhow::Error),
    Panic(String),
}

impl TaskFailure {
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskFailure::Panic(_))
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Error(error) => write!(f, "task failed: {error:#}"),
            TaskFailure::Panic(message) => write!(f, "task panicked: {message}"),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
