use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use taskpool_errors::{DispatchError, DispatchResult};
use tokio::sync::oneshot;

/// Completion handle for a task submitted with [`Dispatcher::spawn`].
///
/// Await it from async code or call [`TaskHandle::join`] from a plain
/// thread. Resolves to `Canceled` when the task is dropped without running
/// (discarded, evicted or cleared by shutdown).
///
/// [`Dispatcher::spawn`]: crate::Dispatcher::spawn
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<DispatchResult<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<DispatchResult<T>>) -> Self {
        Self { rx }
    }

    /// Blocks the current thread until the task finishes.
    ///
    /// Panics if called from within an async runtime; await the handle there.
    pub fn join(self) -> DispatchResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(DispatchError::Canceled))
    }

    /// Non-blocking check; `None` while the task is still pending.
    pub fn try_join(&mut self) -> Option<DispatchResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DispatchError::Canceled)),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = DispatchResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(DispatchError::Canceled)))
    }
}
