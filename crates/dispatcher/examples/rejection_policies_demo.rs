use std::thread;
use std::time::Duration;

use taskpool_dispatcher::{Dispatcher, PoolConfig, RejectionPolicy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 拒绝策略演示 ===\n");
    println!("线程池: core=2, max=4, queue=2, 提交8个各耗时50ms的任务\n");

    for policy in [
        RejectionPolicy::Discard,
        RejectionPolicy::DiscardOldest,
        RejectionPolicy::CallerRuns,
        RejectionPolicy::SignalFailure,
    ] {
        let dispatcher = Dispatcher::new(PoolConfig::new(2, 4, 2).with_policy(policy))?;

        println!("{policy}:");
        for id in 1..=8 {
            let result =
                dispatcher.submit(move || thread::sleep(Duration::from_millis(50)));
            match result {
                Ok(admission) => println!("   任务{id}: {admission:?}"),
                Err(e) => println!("   任务{id}: {e}"),
            }
        }

        let report = dispatcher.shutdown(true);
        let stats = dispatcher.stats();
        println!(
            "   完成: {}, 丢弃: {}, 拒绝: {}, 峰值线程数: {}\n",
            report.completed, stats.discarded, stats.rejected, stats.largest_pool_size
        );
    }

    Ok(())
}
