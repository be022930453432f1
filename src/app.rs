use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use serde::Serialize;
use taskpool_config::AppConfig;
use taskpool_dispatcher::{
    Admission, DispatchError, Dispatcher, PoolStats, ShutdownReport, ShutdownSignal,
};
use taskpool_observability::StructuredLogger;
use tracing::{debug, info, warn};

use crate::shutdown;

/// 批量投递负载参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadOptions {
    pub recipients: usize,
    pub latency: Duration,
    /// Probability in `[0, 1]` that a single delivery fails.
    pub failure_rate: f64,
}

impl Default for WorkloadOptions {
    fn default() -> Self {
        Self {
            recipients: 200,
            latency: Duration::from_millis(10),
            failure_rate: 0.05,
        }
    }
}

impl WorkloadOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(anyhow!(
                "failure_rate必须在0到1之间: {}",
                self.failure_rate
            ));
        }
        Ok(())
    }
}

/// How the submissions of one workload were admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionCounts {
    pub core_worker: usize,
    pub queued: usize,
    pub overflow_worker: usize,
    pub ran_on_caller: usize,
    pub discarded: usize,
    pub evicted_oldest: usize,
    /// Refused with `Rejected` under `signal_failure`.
    pub rejected: usize,
}

impl AdmissionCounts {
    pub fn record(&mut self, admission: Admission) {
        match admission {
            Admission::CoreWorker => self.core_worker += 1,
            Admission::Queued => self.queued += 1,
            Admission::OverflowWorker => self.overflow_worker += 1,
            Admission::RanOnCaller => self.ran_on_caller += 1,
            Admission::Discarded => self.discarded += 1,
            Admission::EvictedOldest => self.evicted_oldest += 1,
        }
    }

    /// Submissions whose own task was accepted.
    pub fn admitted(&self) -> usize {
        self.core_worker
            + self.queued
            + self.overflow_worker
            + self.ran_on_caller
            + self.evicted_oldest
    }
}

/// 负载运行结果，以JSON输出
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub recipients: usize,
    pub admissions: AdmissionCounts,
    pub interrupted: bool,
    pub shutdown: ShutdownReport,
    pub stats: PoolStats,
    pub elapsed_ms: u64,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    dispatcher: Dispatcher,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(config.pool.clone()).context("创建任务调度器失败")?;

        StructuredLogger::log_pool_started(
            config.pool.core_size,
            config.pool.max_size,
            config.pool.queue_capacity,
            config.pool.rejection_policy.as_str(),
        );

        Ok(Self { config, dispatcher })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Submits one delivery task per recipient. Blocks under `caller_runs`,
    /// so async callers should run it on a blocking thread.
    pub fn submit_workload(&self, options: &WorkloadOptions) -> Result<AdmissionCounts> {
        options.validate()?;
        let mut counts = AdmissionCounts::default();
        let signal = self.dispatcher.shutdown_signal();

        for recipient in 0..options.recipients {
            let task = delivery_task(recipient, *options, signal.clone());
            match self.dispatcher.submit(task) {
                Ok(admission) => counts.record(admission),
                Err(e) if e.is_backpressure() => {
                    counts.rejected += 1;
                    debug!(recipient, "投递任务被拒绝: {}", e);
                }
                Err(DispatchError::ShutDown) => {
                    warn!(
                        submitted = recipient,
                        "调度器已关闭，停止提交剩余任务"
                    );
                    break;
                }
                Err(e) => return Err(e).context("提交投递任务失败"),
            }
        }

        StructuredLogger::log_workload_submitted(
            options.recipients,
            counts.admitted(),
            counts.rejected,
        );
        Ok(counts)
    }

    /// Runs the workload, then shuts the pool down as configured. If
    /// `interrupt` resolves first the pool is stopped without draining.
    pub async fn run<S>(self, options: WorkloadOptions, interrupt: S) -> Result<WorkloadReport>
    where
        S: Future<Output = ()>,
    {
        let started = Instant::now();
        info!(
            recipients = options.recipients,
            latency_ms = options.latency.as_millis() as u64,
            failure_rate = options.failure_rate,
            "开始批量投递"
        );

        tokio::pin!(interrupt);
        let mut stopped = None;

        let dispatcher = self.dispatcher.clone();
        let submit = {
            let app = self;
            tokio::task::spawn_blocking(move || {
                let counts = app.submit_workload(&options);
                (app, counts)
            })
        };
        tokio::pin!(submit);

        let (app, admissions) = tokio::select! {
            joined = &mut submit => {
                let (app, counts) = joined.context("提交线程异常退出")?;
                (app, counts?)
            }
            _ = &mut interrupt => {
                stopped = Some(shutdown::stop_now(&dispatcher).await?);
                let (app, counts) = submit.await.context("提交线程异常退出")?;
                (app, counts?)
            }
        };

        let mut interrupted = stopped.is_some();
        let report = if let Some(report) = stopped {
            report
        } else {
            let pool = &app.config.pool;
            let graceful = shutdown::shutdown_dispatcher(
                &app.dispatcher,
                pool.drain_on_shutdown,
                pool.shutdown_timeout(),
            );
            tokio::select! {
                report = graceful => report?,
                _ = &mut interrupt => {
                    interrupted = true;
                    shutdown::stop_now(&app.dispatcher).await?
                }
            }
        };

        let report = WorkloadReport {
            recipients: options.recipients,
            admissions,
            interrupted,
            shutdown: report,
            stats: app.dispatcher.stats(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            completed = report.stats.completed,
            failed = report.stats.failed,
            interrupted,
            "批量投递结束"
        );
        Ok(report)
    }
}

fn delivery_task(
    recipient: usize,
    options: WorkloadOptions,
    signal: ShutdownSignal,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    move || {
        if signal.is_raised() {
            return Err(anyhow!("投递到 recipient-{recipient} 被关闭中断"));
        }
        std::thread::sleep(options.latency);
        if rand::rng().random_bool(options.failure_rate) {
            return Err(anyhow!("投递到 recipient-{recipient} 失败: 模拟的传输错误"));
        }
        Ok(())
    }
}
