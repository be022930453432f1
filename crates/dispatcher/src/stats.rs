use serde::Serialize;

/// Which scheduling step accepted a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// A new core worker was started with the task as its first job.
    CoreWorker,
    /// The task was appended to the queue.
    Queued,
    /// Queue full: an extra worker above `core_size` was started for it.
    OverflowWorker,
    /// Saturated under `caller_runs`: the submitting thread ran it.
    RanOnCaller,
    /// Saturated under `discard` (or nothing to evict): dropped.
    Discarded,
    /// Saturated under `discard_oldest`: the queue head was dropped instead.
    EvictedOldest,
}

impl Admission {
    /// Whether the submitted task itself will run (or already ran).
    pub fn will_run(&self) -> bool {
        !matches!(self, Admission::Discarded)
    }
}

/// Point-in-time snapshot of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub core_size: usize,
    pub max_size: usize,
    pub live_workers: usize,
    pub active_workers: usize,
    pub largest_pool_size: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    pub completed: u64,
    pub failed: u64,
    pub discarded: u64,
    pub rejected: u64,
    pub caller_runs: u64,
}

impl PoolStats {
    /// Tasks that ran to the end, successfully or not.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ShutdownReport {
    /// Queued tasks dropped by a non-draining shutdown.
    pub discarded: usize,
    pub completed: u64,
    pub failed: u64,
}
