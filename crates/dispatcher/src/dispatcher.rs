use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use metrics::gauge;
use taskpool_config::{ConfigValidator, PoolConfig, RejectionPolicy};
use taskpool_errors::{DispatchError, DispatchResult};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::handle::TaskHandle;
use crate::pool::{RunState, Shared};
use crate::signal::ShutdownSignal;
use crate::sink::{ErrorSink, TracingErrorSink};
use crate::stats::{Admission, PoolStats, ShutdownReport};
use crate::task::{panic_message, IntoOutcome, Task};
use crate::worker;

/// Bounded task dispatcher.
///
/// Cloning is cheap and every clone drives the same pool, so one dispatcher
/// built at startup can be handed to each collaborator that submits work.
/// Dropping the handles does not stop the workers; call [`shutdown`].
///
/// [`shutdown`]: Dispatcher::shutdown
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

pub struct DispatcherBuilder {
    config: PoolConfig,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl DispatcherBuilder {
    pub fn new(config: PoolConfig) -> Self {
        Self { config, sink: None }
    }

    pub fn error_sink<S: ErrorSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn shared_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> DispatchResult<Dispatcher> {
        self.config
            .validate()
            .map_err(|e| DispatchError::config_error(e.to_string()))?;

        debug!(
            core_size = self.config.core_size,
            max_size = self.config.max_size,
            queue_capacity = self.config.queue_capacity,
            rejection_policy = %self.config.rejection_policy,
            "Creating task dispatcher"
        );

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingErrorSink) as Arc<dyn ErrorSink>);

        Ok(Dispatcher {
            shared: Arc::new(Shared::new(self.config, sink)),
        })
    }
}

impl Dispatcher {
    pub fn new(config: PoolConfig) -> DispatchResult<Self> {
        DispatcherBuilder::new(config).build()
    }

    pub fn builder(config: PoolConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Submits a fire-and-forget closure. See [`Dispatcher::execute`].
    pub fn submit<F, R>(&self, f: F) -> DispatchResult<Admission>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoOutcome,
    {
        self.execute(Task::new(f))
    }

    /// Admits a task:
    ///
    /// 1. fewer than `core_size` workers: start one for this task;
    /// 2. queue has room: enqueue;
    /// 3. fewer than `max_size` workers: start one for this task;
    /// 4. otherwise apply the rejection policy.
    ///
    /// Never blocks beyond the pool lock, except under `caller_runs` where the
    /// task runs on the calling thread.
    pub fn execute(&self, task: Task) -> DispatchResult<Admission> {
        let shared = &self.shared;
        let config = &shared.config;
        let mut state = shared.state.lock();

        if state.run_state != RunState::Running {
            return Err(DispatchError::ShutDown);
        }

        if state.live < config.core_size {
            state.reserve_worker();
            drop(state);
            self.start_worker(Some(task))?;
            return Ok(Admission::CoreWorker);
        }

        if state.queue.len() < config.queue_capacity {
            // only reachable with core_size == 0 or core timeout; workers
            // retire on an empty queue, so the task goes straight to the new one
            if state.live == 0 {
                state.reserve_worker();
                drop(state);
                self.start_worker(Some(task))?;
                return Ok(Admission::Queued);
            }

            state.queue.push_back(task);
            gauge!("taskpool_queue_depth").set(state.queue.len() as f64);
            drop(state);
            shared.work_available.notify_one();
            return Ok(Admission::Queued);
        }

        if state.live < config.max_size {
            state.reserve_worker();
            drop(state);
            self.start_worker(Some(task))?;
            return Ok(Admission::OverflowWorker);
        }

        let (queued, live) = (state.queue.len(), state.live);
        match config.rejection_policy {
            RejectionPolicy::Discard => {
                drop(state);
                drop(task);
                shared.record_discarded(1);
                debug!(queued, live, "Pool saturated, discarding task");
                Ok(Admission::Discarded)
            }
            RejectionPolicy::DiscardOldest => match state.queue.pop_front() {
                Some(evicted) => {
                    state.queue.push_back(task);
                    drop(state);
                    drop(evicted);
                    shared.record_discarded(1);
                    warn!(queued, live, "Pool saturated, evicted oldest queued task");
                    Ok(Admission::EvictedOldest)
                }
                None => {
                    drop(state);
                    drop(task);
                    shared.record_discarded(1);
                    debug!(live, "Pool saturated with no queue to evict from, discarding task");
                    Ok(Admission::Discarded)
                }
            },
            RejectionPolicy::CallerRuns => {
                drop(state);
                shared.counters.caller_runs.fetch_add(1, Ordering::AcqRel);
                let caller = thread::current();
                shared.run_task(task, caller.name().unwrap_or("caller"));
                Ok(Admission::RanOnCaller)
            }
            RejectionPolicy::SignalFailure => {
                drop(state);
                shared.record_rejected();
                warn!(
                    queued,
                    live, "Queue full and max workers reached, rejecting task"
                );
                Err(DispatchError::rejected(queued, live))
            }
        }
    }

    /// Like [`submit`](Dispatcher::submit) but returns a handle resolving to
    /// the closure's value. A discarded or evicted task resolves to
    /// `DispatchError::Canceled`.
    pub fn spawn<F, T>(&self, f: F) -> DispatchResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.execute(Task::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let _ = tx.send(Err(DispatchError::TaskPanicked(message)));
                    // let the worker's panic boundary report it to the sink
                    panic::resume_unwind(payload);
                }
            }
        }))?;
        Ok(TaskHandle::new(rx))
    }

    fn start_worker(&self, first: Option<Task>) -> DispatchResult<()> {
        match worker::spawn(&self.shared, first) {
            Ok(name) => {
                debug!(worker = %name, "Worker started");
                Ok(())
            }
            Err(e) => {
                self.shared.release_worker();
                error!("Failed to spawn worker thread: {}", e);
                Err(DispatchError::WorkerSpawn(e))
            }
        }
    }

    /// Stops accepting tasks and waits for the workers to exit.
    ///
    /// With `drain`, queued tasks still run. Without it, queued tasks are
    /// dropped and the shutdown signal is raised for in-flight tasks. A task
    /// that never returns makes this wait forever; use
    /// [`shutdown_timeout`](Dispatcher::shutdown_timeout) to bound it.
    pub fn shutdown(&self, drain: bool) -> ShutdownReport {
        let discarded = self.begin_shutdown(drain);
        let floor = self.own_worker_slot();

        let mut state = self.shared.state.lock();
        while state.live > floor {
            self.shared.terminated.wait(&mut state);
        }
        drop(state);

        self.report(discarded)
    }

    pub fn shutdown_timeout(&self, drain: bool, timeout: Duration) -> DispatchResult<ShutdownReport> {
        let discarded = self.begin_shutdown(drain);
        let floor = self.own_worker_slot();
        let deadline = Instant::now() + timeout;

        let mut state = self.shared.state.lock();
        while state.live > floor {
            if self
                .shared
                .terminated
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.live > floor
            {
                warn!(live = state.live, "Shutdown timed out with workers still running");
                return Err(DispatchError::ShutdownTimeout { live: state.live });
            }
        }
        drop(state);

        Ok(self.report(discarded))
    }

    /// A worker calling shutdown cannot wait for itself to exit.
    fn own_worker_slot(&self) -> usize {
        if worker::is_worker_of(self.shared.id) {
            warn!("Shutdown requested from a worker thread; not waiting for that worker");
            1
        } else {
            0
        }
    }

    fn begin_shutdown(&self, drain: bool) -> usize {
        let mut state = self.shared.state.lock();
        let dropped = match (state.run_state, drain) {
            (RunState::Running, true) => {
                state.run_state = RunState::Draining;
                if state.live == 0 {
                    // nothing left to drain these
                    std::mem::take(&mut state.queue)
                } else {
                    VecDeque::new()
                }
            }
            (RunState::Running | RunState::Draining, false) => {
                state.run_state = RunState::Stopped;
                std::mem::take(&mut state.queue)
            }
            _ => VecDeque::new(),
        };
        let (queued, live) = (state.queue.len(), state.live);
        drop(state);

        if !drain {
            self.shared.signal.raise();
        }
        self.shared.work_available.notify_all();

        let discarded = dropped.len();
        drop(dropped);
        if discarded > 0 {
            self.shared.record_discarded(discarded);
        }
        gauge!("taskpool_queue_depth").set(queued as f64);

        info!(
            drain,
            queued,
            discarded,
            live_workers = live,
            "Task dispatcher shutting down"
        );
        discarded
    }

    fn report(&self, discarded: usize) -> ShutdownReport {
        let counters = &self.shared.counters;
        ShutdownReport {
            discarded,
            completed: counters.completed.load(Ordering::Acquire),
            failed: counters.failed.load(Ordering::Acquire),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shared.signal.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().run_state != RunState::Running
    }

    /// Shut down and every worker has exited.
    pub fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.run_state != RunState::Running && state.live == 0
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn pool(core: usize, max: usize, queue: usize, policy: RejectionPolicy) -> Dispatcher {
        Dispatcher::new(PoolConfig::new(core, max, queue).with_policy(policy)).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Dispatcher::new(PoolConfig::new(3, 2, 1));
        assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
    }

    #[test]
    fn test_core_workers_start_before_queueing() {
        let dispatcher = pool(2, 4, 4, RejectionPolicy::SignalFailure);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));

        for _ in 0..2 {
            let rx = Arc::clone(&release_rx);
            let admission = dispatcher
                .submit(move || {
                    let _ = rx.lock().recv();
                })
                .unwrap();
            assert_eq!(admission, Admission::CoreWorker);
        }

        let stats = dispatcher.stats();
        assert_eq!(stats.live_workers, 2);
        assert_eq!(stats.queued, 0);

        drop(release_tx);
        dispatcher.shutdown(true);
        assert!(dispatcher.is_terminated());
    }

    #[test]
    fn test_zero_core_starts_worker_for_queued_task() {
        let dispatcher = pool(0, 1, 4, RejectionPolicy::SignalFailure);
        let (done_tx, done_rx) = mpsc::channel();

        let admission = dispatcher
            .submit(move || {
                done_tx.send(()).unwrap();
            })
            .unwrap();

        assert_eq!(admission, Admission::Queued);
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("queued task never ran");
        dispatcher.shutdown(true);
    }

    #[test]
    fn test_zero_core_hands_task_to_new_worker() {
        let dispatcher = pool(0, 2, 4, RejectionPolicy::SignalFailure);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let admission = dispatcher
            .submit(move || {
                let _ = release_rx.recv();
            })
            .unwrap();

        assert_eq!(admission, Admission::Queued);
        let stats = dispatcher.stats();
        assert_eq!(stats.live_workers, 1);
        // the task never sits in the queue, so a failed spawn cannot strand it there
        assert_eq!(stats.queued, 0);

        // with a live worker, later submissions queue normally
        assert_eq!(dispatcher.submit(|| ()).unwrap(), Admission::Queued);
        assert_eq!(dispatcher.stats().queued, 1);

        drop(release_tx);
        dispatcher.shutdown(true);
        assert_eq!(dispatcher.stats().completed, 2);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let dispatcher = pool(1, 1, 1, RejectionPolicy::Discard);
        dispatcher.shutdown(true);
        assert!(dispatcher.is_shutdown());
        assert!(matches!(
            dispatcher.submit(|| ()),
            Err(DispatchError::ShutDown)
        ));
    }

    #[test]
    fn test_worker_threads_use_prefix() {
        let dispatcher = Dispatcher::new(
            PoolConfig::new(1, 1, 1).with_thread_name_prefix("mailer-"),
        )
        .unwrap();
        let handle = dispatcher
            .spawn(|| thread::current().name().map(str::to_owned))
            .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("mailer-1"));
        dispatcher.shutdown(true);
    }

    #[test]
    fn test_shutdown_from_worker_does_not_deadlock() {
        let dispatcher = pool(1, 1, 1, RejectionPolicy::SignalFailure);
        let inner = dispatcher.clone();
        let discarded = Arc::new(AtomicUsize::new(usize::MAX));
        let observed = Arc::clone(&discarded);

        let handle = dispatcher
            .spawn(move || {
                let report = inner.shutdown(false);
                observed.store(report.discarded, Ordering::SeqCst);
            })
            .unwrap();

        handle.join().unwrap();
        assert_eq!(discarded.load(Ordering::SeqCst), 0);
        dispatcher.shutdown(false);
        assert!(dispatcher.is_terminated());
    }
}
