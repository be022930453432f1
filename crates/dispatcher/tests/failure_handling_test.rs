use std::time::Duration;

use anyhow::anyhow;
use taskpool_dispatcher::{Dispatcher, PoolConfig, TaskFailure};
use taskpool_testing_utils::{wait_until, RecordingSink, Recorder};

const TIMEOUT: Duration = Duration::from_secs(5);

fn single_worker_pool(sink: RecordingSink) -> Dispatcher {
    Dispatcher::builder(PoolConfig::new(1, 1, 8))
        .error_sink(sink)
        .build()
        .unwrap()
}

#[test]
fn test_failed_task_is_reported_and_worker_keeps_running() {
    let sink = RecordingSink::new();
    let dispatcher = single_worker_pool(sink.clone());
    let ran = Recorder::new();

    dispatcher
        .submit(|| -> anyhow::Result<()> { Err(anyhow!("smtp relay refused")) })
        .unwrap();
    let r = ran.clone();
    dispatcher.submit(move || r.record("after failure")).unwrap();

    assert!(wait_until(TIMEOUT, || dispatcher.stats().finished() == 2));

    let stats = dispatcher.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.live_workers, 1);
    assert_eq!(ran.entries(), vec!["after failure"]);

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "smtp relay refused");
    assert_eq!(failures[0].worker, "taskpool-1");
    assert!(!failures[0].panicked);

    dispatcher.shutdown(true);
}

#[test]
fn test_panicking_task_does_not_kill_worker() {
    let sink = RecordingSink::new();
    let dispatcher = single_worker_pool(sink.clone());

    dispatcher
        .submit(|| -> () { panic!("template missing") })
        .unwrap();
    dispatcher.submit(|| ()).unwrap();
    dispatcher.submit(|| ()).unwrap();

    assert!(wait_until(TIMEOUT, || dispatcher.stats().finished() == 3));

    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 2);
    // the same worker handled everything after the panic
    assert_eq!(stats.largest_pool_size, 1);

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].panicked);
    assert_eq!(failures[0].message, "template missing");

    dispatcher.shutdown(true);
}

#[test]
fn test_panicking_sink_is_contained() {
    let dispatcher = Dispatcher::builder(PoolConfig::new(1, 1, 8))
        .error_sink(|_worker: &str, _failure: &TaskFailure| -> () { panic!("sink broken") })
        .build()
        .unwrap();

    dispatcher
        .submit(|| -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk full"))
        })
        .unwrap();
    dispatcher.submit(|| ()).unwrap();

    assert!(wait_until(TIMEOUT, || dispatcher.stats().finished() == 2));
    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.live_workers, 1);

    dispatcher.shutdown(true);
}

#[test]
fn test_failures_reported_for_caller_run_tasks() {
    let sink = RecordingSink::new();
    let dispatcher = Dispatcher::builder(
        PoolConfig::new(0, 1, 0).with_policy(taskpool_dispatcher::RejectionPolicy::CallerRuns),
    )
    .error_sink(sink.clone())
    .build()
    .unwrap();

    // no core workers and no queue: the first task gets an overflow worker
    let gate = taskpool_testing_utils::Gate::new();
    let g = gate.clone();
    dispatcher.submit(move || g.wait()).unwrap();

    dispatcher
        .submit(|| -> anyhow::Result<()> { Err(anyhow!("bounced")) })
        .unwrap();

    // caller-run failures are reported synchronously
    assert_eq!(sink.count(), 1);
    assert_eq!(dispatcher.stats().failed, 1);

    gate.open();
    dispatcher.shutdown(true);
}
