//! Test helper utilities for multi-threaded assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A latch that keeps tasks parked inside their workers until opened.
///
/// Clones share the same latch. `entered()` counts how many tasks are
/// currently or were ever blocked on it.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    open: Mutex<bool>,
    opened: Condvar,
    entered: AtomicUsize,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) {
        self.inner.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.inner.open.lock();
        while !*open {
            self.inner.opened.wait(&mut open);
        }
    }

    pub fn open(&self) {
        *self.inner.open.lock() = true;
        self.inner.opened.notify_all();
    }

    pub fn entered(&self) -> usize {
        self.inner.entered.load(Ordering::SeqCst)
    }

    /// Blocks until `count` tasks have reached the gate.
    pub fn wait_for_entered(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.entered() >= count)
    }
}

/// Thread-safe, ordered log of tags recorded by tasks.
#[derive(Clone, Default)]
pub struct Recorder<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, entry: T) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
