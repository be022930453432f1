use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use taskpool_config::{LogConfig, LogLevel, OutputFormat};
use tracing::{info, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type FileLayer<S> = fmt::Layer<S, DefaultFields, Format, Mutex<File>>;

/// `RUST_LOG` wins over the configured level when it is set and parses.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Plain-text layer appending to `log_file_path`, or `None` when file
/// logging is off. Missing parent directories are created.
pub fn file_layer<S>(config: &LogConfig) -> Result<Option<FileLayer<S>>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if !config.enable_file_logging {
        return Ok(None);
    }

    let path = config
        .log_file_path
        .as_deref()
        .context("启用文件日志时必须配置log_file_path")?;
    if let Some(parent) = Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建日志目录失败: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败: {path}"))?;

    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_names(config.include_thread_names);
    Ok(Some(layer))
}

pub fn init_logging(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(file_layer(config)?);

    match config.format {
        OutputFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_names(config.include_thread_names);

            registry
                .with(fmt_layer)
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_names(config.include_thread_names);

            registry
                .with(fmt_layer)
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        OutputFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_names(config.include_thread_names);

            registry
                .with(fmt_layer)
                .try_init()
                .context("初始化Text日志格式失败")?;
        }
    }

    info!(
        logging.format = ?config.format,
        logging.level = %config.level,
        logging.location = config.include_location,
        logging.file = config.log_file_path.as_deref().filter(|_| config.enable_file_logging),
        "Structured logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_uses_configured_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = env_filter(LogLevel::Warn);
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::WARN)
        );
    }

    #[test]
    fn test_file_layer_disabled_by_default() {
        let layer = file_layer::<tracing_subscriber::Registry>(&LogConfig::default()).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn test_file_layer_requires_path() {
        let config = LogConfig {
            enable_file_logging: true,
            ..LogConfig::default()
        };
        assert!(file_layer::<tracing_subscriber::Registry>(&config).is_err());
    }

    #[test]
    fn test_file_layer_writes_events() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("taskpool.log");
        let config = LogConfig {
            enable_file_logging: true,
            log_file_path: Some(path.to_string_lossy().into_owned()),
            ..LogConfig::default()
        };

        let subscriber = tracing_subscriber::registry().with(file_layer(&config).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            info!(worker = "taskpool-1", "delivery finished");
        });

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("delivery finished"));
        assert!(written.contains("taskpool-1"));
        // plain text, no colour codes
        assert!(!written.contains('\u{1b}'));
    }

    #[test]
    fn test_init_logging_twice_fails_gracefully() {
        let config = LogConfig {
            format: OutputFormat::Text,
            ..LogConfig::default()
        };
        // the first call may race with other tests in this binary; the
        // second one must report an error rather than panic
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
