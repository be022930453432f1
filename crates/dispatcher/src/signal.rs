use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised by a non-draining shutdown. Long-running tasks may poll it to stop
/// early; the dispatcher never interrupts a task on its own.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }
}
