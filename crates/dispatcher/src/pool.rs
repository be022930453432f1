use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use parking_lot::{Condvar, Mutex};
use taskpool_config::PoolConfig;
use tracing::error;

use crate::signal::ShutdownSignal;
use crate::sink::ErrorSink;
use crate::stats::PoolStats;
use crate::task::Task;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Running,
    /// No new submissions; workers finish the queue, then retire.
    Draining,
    /// No new submissions; queue already cleared, workers retire after their current task.
    Stopped,
}

pub(crate) struct PoolState {
    pub(crate) queue: VecDeque<Task>,
    pub(crate) live: usize,
    pub(crate) largest: usize,
    pub(crate) run_state: RunState,
}

impl PoolState {
    /// Counts a worker as live before its thread exists, so concurrent
    /// submitters never overshoot `max_size`.
    pub(crate) fn reserve_worker(&mut self) {
        self.live += 1;
        self.largest = self.largest.max(self.live);
        gauge!("taskpool_live_workers").set(self.live as f64);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) caller_runs: AtomicU64,
}

/// State shared between dispatcher handles and worker threads.
pub(crate) struct Shared {
    pub(crate) id: u64,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState>,
    /// Signalled when a task is queued or shutdown begins.
    pub(crate) work_available: Condvar,
    /// Signalled whenever a worker retires.
    pub(crate) terminated: Condvar,
    pub(crate) active: AtomicUsize,
    pub(crate) next_worker: AtomicUsize,
    pub(crate) counters: Counters,
    pub(crate) sink: Arc<dyn ErrorSink>,
    pub(crate) signal: ShutdownSignal,
    keep_alive: Duration,
}

impl Shared {
    pub(crate) fn new(config: PoolConfig, sink: Arc<dyn ErrorSink>) -> Self {
        let keep_alive = config.keep_alive();
        let queue = VecDeque::with_capacity(config.queue_capacity.min(1024));
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state: Mutex::new(PoolState {
                queue,
                live: 0,
                largest: 0,
                run_state: RunState::Running,
            }),
            work_available: Condvar::new(),
            terminated: Condvar::new(),
            active: AtomicUsize::new(0),
            next_worker: AtomicUsize::new(0),
            counters: Counters::default(),
            sink,
            signal: ShutdownSignal::new(),
            keep_alive,
        }
    }

    /// Blocks a worker until a task is available. `None` means the worker
    /// has been retired and must exit; the live count is already decremented.
    pub(crate) fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        let mut timed_out = false;

        loop {
            if state.run_state == RunState::Stopped {
                self.retire(&mut state);
                return None;
            }

            if let Some(task) = state.queue.pop_front() {
                gauge!("taskpool_queue_depth").set(state.queue.len() as f64);
                return Some(task);
            }

            if state.run_state == RunState::Draining {
                self.retire(&mut state);
                return None;
            }

            let timed = self.config.allow_core_timeout || state.live > self.config.core_size;
            if timed && timed_out {
                self.retire(&mut state);
                return None;
            }

            timed_out = if timed {
                self.work_available
                    .wait_for(&mut state, self.keep_alive)
                    .timed_out()
            } else {
                self.work_available.wait(&mut state);
                false
            };
        }
    }

    pub(crate) fn retire(&self, state: &mut PoolState) {
        state.live -= 1;
        gauge!("taskpool_live_workers").set(state.live as f64);
        self.terminated.notify_all();
    }

    /// Undo a `reserve_worker` whose thread never started.
    pub(crate) fn release_worker(&self) {
        let mut state = self.state.lock();
        self.retire(&mut state);
    }

    /// Runs one task and accounts for it. Failures go to the sink before the
    /// counters move, so anyone polling the counters also sees the report.
    pub(crate) fn run_task(&self, task: Task, worker: &str) {
        self.active.fetch_add(1, Ordering::AcqRel);
        let started = Instant::now();
        let outcome = task.run();
        histogram!("taskpool_task_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::AcqRel);
                counter!("taskpool_tasks_completed_total").increment(1);
            }
            Err(failure) => {
                let reported =
                    panic::catch_unwind(AssertUnwindSafe(|| self.sink.report(worker, &failure)));
                if reported.is_err() {
                    error!(worker = worker, "Error sink panicked while reporting: {}", failure);
                }
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                counter!("taskpool_tasks_failed_total").increment(1);
            }
        }

        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.counters
            .discarded
            .fetch_add(count as u64, Ordering::AcqRel);
        counter!("taskpool_tasks_discarded_total").increment(count as u64);
    }

    pub(crate) fn record_rejected(&self) {
        self.counters.rejected.fetch_add(1, Ordering::AcqRel);
        counter!("taskpool_tasks_rejected_total").increment(1);
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            core_size: self.config.core_size,
            max_size: self.config.max_size,
            live_workers: state.live,
            active_workers: self.active.load(Ordering::Acquire),
            largest_pool_size: state.largest,
            queued: state.queue.len(),
            queue_capacity: self.config.queue_capacity,
            completed: self.counters.completed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
            discarded: self.counters.discarded.load(Ordering::Acquire),
            rejected: self.counters.rejected.load(Ordering::Acquire),
            caller_runs: self.counters.caller_runs.load(Ordering::Acquire),
        }
    }
}
