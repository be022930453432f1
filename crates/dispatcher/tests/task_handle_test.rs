use std::time::Duration;

use taskpool_dispatcher::{DispatchError, Dispatcher, PoolConfig, RejectionPolicy};
use taskpool_testing_utils::{wait_until, Gate, RecordingSink};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_join_returns_task_value() {
    let dispatcher = Dispatcher::new(PoolConfig::new(2, 2, 4)).unwrap();
    let handle = dispatcher.spawn(|| 6 * 7).unwrap();
    assert_eq!(handle.join().unwrap(), 42);
    dispatcher.shutdown(true);
}

#[test]
fn test_panicking_task_resolves_to_task_panicked() {
    let sink = RecordingSink::new();
    let dispatcher = Dispatcher::builder(PoolConfig::new(1, 1, 4))
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let handle = dispatcher
        .spawn(|| -> u32 { panic!("recipient list corrupt") })
        .unwrap();

    match handle.join() {
        Err(DispatchError::TaskPanicked(message)) => {
            assert_eq!(message, "recipient list corrupt")
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(wait_until(TIMEOUT, || dispatcher.stats().failed == 1));
    assert_eq!(sink.count(), 1);
    dispatcher.shutdown(true);
}

#[test]
fn test_discarded_task_resolves_to_canceled() {
    let dispatcher = Dispatcher::new(
        PoolConfig::new(1, 1, 0).with_policy(RejectionPolicy::Discard),
    )
    .unwrap();
    let gate = Gate::new();
    let g = gate.clone();
    dispatcher.submit(move || g.wait()).unwrap();

    let handle = dispatcher.spawn(|| "never").unwrap();
    assert!(matches!(handle.join(), Err(DispatchError::Canceled)));

    gate.open();
    dispatcher.shutdown(true);
}

#[test]
fn test_dropped_queue_cancels_pending_handles() {
    let dispatcher = Dispatcher::new(PoolConfig::new(1, 1, 4)).unwrap();
    let gate = Gate::new();
    let g = gate.clone();
    dispatcher.submit(move || g.wait()).unwrap();
    assert!(gate.wait_for_entered(1, TIMEOUT));

    let mut pending = dispatcher.spawn(|| 1).unwrap();
    assert!(pending.try_join().is_none());

    let closer = {
        let dispatcher = dispatcher.clone();
        std::thread::spawn(move || dispatcher.shutdown(false))
    };
    assert!(wait_until(TIMEOUT, || dispatcher.stats().discarded == 1));
    gate.open();
    closer.join().unwrap();

    assert!(matches!(pending.join(), Err(DispatchError::Canceled)));
}

#[test]
fn test_signal_failure_surfaces_from_spawn() {
    let dispatcher = Dispatcher::new(
        PoolConfig::new(1, 1, 0).with_policy(RejectionPolicy::SignalFailure),
    )
    .unwrap();
    let gate = Gate::new();
    let g = gate.clone();
    dispatcher.submit(move || g.wait()).unwrap();

    let result = dispatcher.spawn(|| ());
    assert!(matches!(result, Err(DispatchError::Rejected { .. })));

    gate.open();
    dispatcher.shutdown(true);
}

#[tokio::test]
async fn test_handle_can_be_awaited() {
    let dispatcher = Dispatcher::new(PoolConfig::new(1, 2, 4)).unwrap();
    let handle = dispatcher.spawn(|| String::from("delivered")).unwrap();

    let value = tokio::time::timeout(TIMEOUT, handle)
        .await
        .expect("task handle timed out")
        .unwrap();
    assert_eq!(value, "delivered");
    dispatcher.shutdown(true);
}
