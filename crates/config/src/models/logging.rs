use serde::{Deserialize, Serialize};

use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!(
                "Invalid log level: {s}. Valid levels: trace, debug, info, warn, error"
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Pretty,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            "text" | "compact" => Ok(OutputFormat::Text),
            _ => Err(format!(
                "Invalid output format: {s}. Valid formats: json, pretty, text"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: OutputFormat,
    pub include_location: bool,
    pub include_thread_names: bool,
    /// Also append plain-text logs to `log_file_path`.
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: OutputFormat::Pretty,
            include_location: false,
            // worker threads carry the pool's thread-name prefix
            include_thread_names: true,
            enable_file_logging: false,
            log_file_path: None,
        }
    }
}

impl ConfigValidator for LogConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enable_file_logging
            && self
                .log_file_path
                .as_deref()
                .map_or(true, |path| path.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "Log file path is required when file logging is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
