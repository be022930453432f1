use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the dispatcher does with a task when the queue is full and the pool
/// has already grown to `max_size`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Drop the new task silently.
    Discard,
    /// Evict the oldest queued task and queue the new one.
    DiscardOldest,
    /// Run the new task on the submitting thread.
    CallerRuns,
    /// Return an explicit rejection to the submitter.
    #[default]
    SignalFailure,
}

impl RejectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionPolicy::Discard => "discard",
            RejectionPolicy::DiscardOldest => "discard_oldest",
            RejectionPolicy::CallerRuns => "caller_runs",
            RejectionPolicy::SignalFailure => "signal_failure",
        }
    }
}

impl std::str::FromStr for RejectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "discard" => Ok(RejectionPolicy::Discard),
            "discard_oldest" => Ok(RejectionPolicy::DiscardOldest),
            "caller_runs" => Ok(RejectionPolicy::CallerRuns),
            "signal_failure" | "abort" => Ok(RejectionPolicy::SignalFailure),
            _ => Err(format!(
                "Invalid rejection policy: {s}. Valid policies: discard, discard_oldest, caller_runs, signal_failure"
            )),
        }
    }
}

impl std::fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Workers started eagerly per submission and kept alive while idle.
    pub core_size: usize,
    /// Hard ceiling on live workers.
    pub max_size: usize,
    /// Bounded queue length; 0 means tasks are never queued.
    pub queue_capacity: usize,
    /// Idle time after which a worker above `core_size` retires.
    pub keep_alive_ms: u64,
    /// Let core workers retire on idle timeout as well.
    pub allow_core_timeout: bool,
    pub rejection_policy: RejectionPolicy,
    pub thread_name_prefix: String,
    /// Wait for queued work when the application shuts the pool down.
    pub drain_on_shutdown: bool,
    /// Upper bound on the shutdown wait; `None` waits indefinitely.
    pub shutdown_timeout_seconds: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: 5,
            max_size: 20,
            queue_capacity: 100,
            keep_alive_ms: 60_000,
            allow_core_timeout: false,
            rejection_policy: RejectionPolicy::SignalFailure,
            thread_name_prefix: "taskpool-".to_string(),
            drain_on_shutdown: true,
            shutdown_timeout_seconds: Some(30),
        }
    }
}

impl PoolConfig {
    pub fn new(core_size: usize, max_size: usize, queue_capacity: usize) -> Self {
        Self {
            core_size,
            max_size,
            queue_capacity,
            ..Self::default()
        }
    }

    /// Named sizing presets. `default` is 5/20/100, `burst` is 10/50/100.
    pub fn preset(name: &str) -> ConfigResult<Self> {
        match name {
            "default" => Ok(Self::default()),
            "burst" => Ok(Self::new(10, 50, 100)),
            _ => Err(ConfigError::Configuration(format!(
                "Unknown pool preset: {name}. Valid presets: default, burst"
            ))),
        }
    }

    pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_seconds.map(Duration::from_secs)
    }
}

impl ConfigValidator for PoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Err(ConfigError::Validation(
                "max_size must be greater than 0".to_string(),
            ));
        }

        if self.core_size > self.max_size {
            return Err(ConfigError::Validation(format!(
                "core_size ({}) must not exceed max_size ({})",
                self.core_size, self.max_size
            )));
        }

        if self.allow_core_timeout && self.keep_alive_ms == 0 {
            return Err(ConfigError::Validation(
                "keep_alive_ms must be greater than 0 when allow_core_timeout is enabled"
                    .to_string(),
            ));
        }

        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
