use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use taskpool::shutdown::wait_for_shutdown_signal;
use taskpool::{Application, WorkloadOptions};
use taskpool_config::{AppConfig, ConfigValidator, PoolConfig, RejectionPolicy};
use taskpool_observability::init_logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("taskpool")
        .version("1.0.0")
        .about("有界后台任务调度器 - 批量投递演示")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (默认查找 config/taskpool.toml)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "text"]),
        )
        .arg(
            Arg::new("preset")
                .long("preset")
                .value_name("NAME")
                .help("线程池规格预设")
                .value_parser(["default", "burst"]),
        )
        .arg(
            Arg::new("core")
                .long("core")
                .value_name("N")
                .help("核心工作线程数")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max")
                .long("max")
                .value_name("N")
                .help("最大工作线程数")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("queue")
                .long("queue")
                .value_name("N")
                .help("等待队列容量")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_name("POLICY")
                .help("饱和时的拒绝策略")
                .value_parser(["discard", "discard_oldest", "caller_runs", "signal_failure"]),
        )
        .arg(
            Arg::new("recipients")
                .long("recipients")
                .value_name("N")
                .help("投递目标数量")
                .value_parser(clap::value_parser!(usize))
                .default_value("200"),
        )
        .arg(
            Arg::new("latency-ms")
                .long("latency-ms")
                .value_name("MS")
                .help("单次投递耗时 (毫秒)")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            Arg::new("failure-rate")
                .long("failure-rate")
                .value_name("RATE")
                .help("单次投递失败概率 [0, 1]")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.05"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);

    // 加载配置并应用命令行覆盖
    let mut config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })?;
    apply_overrides(&mut config, &matches)?;

    // 初始化日志系统
    init_logging(&config.logging)?;

    info!("启动有界任务调度器");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let options = WorkloadOptions {
        recipients: *matches.get_one::<usize>("recipients").unwrap_or(&200),
        latency: Duration::from_millis(*matches.get_one::<u64>("latency-ms").unwrap_or(&10)),
        failure_rate: *matches.get_one::<f64>("failure-rate").unwrap_or(&0.05),
    };
    options.validate()?;

    let app = Application::new(config)?;
    let report = app.run(options, wait_for_shutdown_signal()).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("序列化运行报告失败")?
    );

    info!("有界任务调度器已退出");
    Ok(())
}

/// 命令行参数优先于配置文件和环境变量
fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse().map_err(|e: String| anyhow!(e))?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.parse().map_err(|e: String| anyhow!(e))?;
    }

    if let Some(preset) = matches.get_one::<String>("preset") {
        let sized = PoolConfig::preset(preset)?;
        config.pool.core_size = sized.core_size;
        config.pool.max_size = sized.max_size;
        config.pool.queue_capacity = sized.queue_capacity;
    }
    if let Some(core) = matches.get_one::<usize>("core") {
        config.pool.core_size = *core;
    }
    if let Some(max) = matches.get_one::<usize>("max") {
        config.pool.max_size = *max;
    }
    if let Some(queue) = matches.get_one::<usize>("queue") {
        config.pool.queue_capacity = *queue;
    }
    if let Some(policy) = matches.get_one::<String>("policy") {
        config.pool.rejection_policy = policy
            .parse::<RejectionPolicy>()
            .map_err(|e| anyhow!("{e}"))?;
    }

    config.validate().context("命令行参数与配置冲突")?;
    Ok(())
}
