use std::time::Duration;

use tracing::{info, warn};

/// Event helpers with stable field names, so log pipelines can key on
/// `event = "..."` instead of parsing messages.
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_pool_started(core_size: usize, max_size: usize, queue_capacity: usize, policy: &str) {
        info!(
            event = "pool_started",
            pool.core_size = core_size,
            pool.max_size = max_size,
            pool.queue_capacity = queue_capacity,
            pool.rejection_policy = policy,
            "Task dispatcher created"
        );
    }

    pub fn log_workload_submitted(total: usize, admitted: usize, rejected: usize) {
        if rejected > 0 {
            warn!(
                event = "workload_submitted",
                workload.total = total,
                workload.admitted = admitted,
                workload.rejected = rejected,
                "Workload submitted under backpressure"
            );
        } else {
            info!(
                event = "workload_submitted",
                workload.total = total,
                workload.admitted = admitted,
                "Workload submitted"
            );
        }
    }

    pub fn log_shutdown_started(drain: bool, queued: usize, live_workers: usize) {
        info!(
            event = "shutdown_started",
            shutdown.drain = drain,
            pool.queued = queued,
            pool.live_workers = live_workers,
            "Shutting down task dispatcher"
        );
    }

    pub fn log_shutdown_complete(completed: u64, failed: u64, discarded: usize, elapsed: Duration) {
        info!(
            event = "shutdown_complete",
            tasks.completed = completed,
            tasks.failed = failed,
            tasks.discarded = discarded,
            shutdown.elapsed_ms = elapsed.as_millis() as u64,
            "Task dispatcher stopped"
        );
    }
}
