use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use taskpool_dispatcher::{DispatchError, Dispatcher, ShutdownReport};
use taskpool_observability::StructuredLogger;
use tokio::signal;
use tracing::{error, info, warn};

/// 等待关闭信号 (Ctrl+C 或 SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

/// Graceful shutdown as configured. If draining outlasts `timeout`, the
/// queue is dropped and the workers get one more `timeout` to finish.
pub async fn shutdown_dispatcher(
    dispatcher: &Dispatcher,
    drain: bool,
    timeout: Option<Duration>,
) -> Result<ShutdownReport> {
    let stats = dispatcher.stats();
    StructuredLogger::log_shutdown_started(drain, stats.queued, stats.live_workers);
    let started = Instant::now();

    let first = blocking_shutdown(dispatcher, drain, timeout).await?;
    let report = match first {
        Ok(report) => report,
        Err(DispatchError::ShutdownTimeout { live }) if drain => {
            warn!(live, "排空队列超时，丢弃剩余任务并强制关闭");
            blocking_shutdown(dispatcher, false, timeout)
                .await?
                .context("强制关闭调度器失败")?
        }
        Err(e) => return Err(e).context("关闭调度器失败"),
    };

    StructuredLogger::log_shutdown_complete(
        report.completed,
        report.failed,
        report.discarded,
        started.elapsed(),
    );
    Ok(report)
}

/// Non-draining shutdown used when the process is interrupted.
pub async fn stop_now(dispatcher: &Dispatcher) -> Result<ShutdownReport> {
    info!("收到中断，立即停止调度器");
    shutdown_dispatcher(dispatcher, false, None).await
}

async fn blocking_shutdown(
    dispatcher: &Dispatcher,
    drain: bool,
    timeout: Option<Duration>,
) -> Result<Result<ShutdownReport, DispatchError>> {
    let dispatcher = dispatcher.clone();
    tokio::task::spawn_blocking(move || match timeout {
        Some(timeout) => dispatcher.shutdown_timeout(drain, timeout),
        None => Ok(dispatcher.shutdown(drain)),
    })
    .await
    .context("关闭线程异常退出")
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpool_config::PoolConfig;

    #[tokio::test]
    async fn test_graceful_shutdown_drains_queue() {
        let dispatcher = Dispatcher::new(PoolConfig::new(1, 1, 8)).unwrap();
        for _ in 0..4 {
            dispatcher
                .submit(|| std::thread::sleep(Duration::from_millis(5)))
                .unwrap();
        }

        let report = shutdown_dispatcher(&dispatcher, true, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(report.completed, 4);
        assert!(dispatcher.is_terminated());
    }

    #[tokio::test]
    async fn test_drain_timeout_escalates_to_stop() {
        let dispatcher = Dispatcher::new(PoolConfig::new(1, 1, 8)).unwrap();
        let signal = dispatcher.shutdown_signal();
        dispatcher
            .submit(move || {
                while !signal.is_raised() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();
        for _ in 0..3 {
            dispatcher.submit(|| ()).unwrap();
        }

        let report = shutdown_dispatcher(&dispatcher, true, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(report.discarded, 3);
        assert!(dispatcher.is_terminated());
    }
}
