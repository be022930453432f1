//! Worker threads
//!
//! A worker runs its first task (if it was started for one), then keeps
//! pulling from the shared queue until `Shared::next_task` retires it.

use std::cell::Cell;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::pool::Shared;
use crate::task::Task;

thread_local! {
    static CURRENT_POOL: Cell<Option<u64>> = const { Cell::new(None) };
}

/// True when the calling thread is one of this pool's workers.
pub(crate) fn is_worker_of(pool_id: u64) -> bool {
    CURRENT_POOL.with(|current| current.get() == Some(pool_id))
}

/// Starts a worker thread. The caller must already have reserved a live slot.
pub(crate) fn spawn(shared: &Arc<Shared>, first: Option<Task>) -> io::Result<String> {
    let id = shared.next_worker.fetch_add(1, Ordering::Relaxed) + 1;
    let name = format!("{}{}", shared.config.thread_name_prefix, id);
    let worker_shared = Arc::clone(shared);

    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run(worker_shared, first))?;

    Ok(name)
}

fn run(shared: Arc<Shared>, first: Option<Task>) {
    CURRENT_POOL.with(|current| current.set(Some(shared.id)));
    let name = thread::current()
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| "taskpool-worker".to_string());

    let mut next = first;
    while let Some(task) = next.take().or_else(|| shared.next_task()) {
        shared.run_task(task, &name);
    }

    debug!(worker = %name, "Worker retired");
}
