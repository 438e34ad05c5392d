//! Configuration types for registries and the executor.

use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable bounding pending stage results, in milliseconds.
pub const ENV_PENDING_TIMEOUT_MS: &str = "FERN_PENDING_TIMEOUT_MS";
/// Environment variable toggling causes in failure payloads.
pub const ENV_EXPOSE_CAUSE: &str = "FERN_EXPOSE_CAUSE";
/// Environment variable selecting the log format (`plain` or `json`).
pub const ENV_LOG_FORMAT: &str = "FERN_LOG_FORMAT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FernConfig {
    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Log output format for [`crate::observability::init_tracing`].
    #[serde(default)]
    pub log_format: LogFormat,
}

impl FernConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = lookup(ENV_PENDING_TIMEOUT_MS).and_then(|v| v.trim().parse().ok()) {
            config.executor.pending_timeout_ms = Some(ms);
        }
        if let Some(expose) = lookup(ENV_EXPOSE_CAUSE).and_then(|v| parse_bool(&v)) {
            config.executor.expose_cause = expose;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok()) {
            config.log_format = format;
        }

        config
    }

    /// Sets the executor configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on resolving a pending result. `None` waits forever.
    #[serde(default)]
    pub pending_timeout_ms: Option<u64>,
    /// Whether failure payloads carry `stack`.
    #[serde(default = "default_expose_cause")]
    pub expose_cause: bool,
    /// Component name in generic failure messages.
    #[serde(default = "default_failure_prefix")]
    pub failure_prefix: String,
}

/// Failure prefix for socket registries.
pub const SOCKET_FAILURE_PREFIX: &str = "SocketError";

fn default_expose_cause() -> bool {
    true
}

fn default_failure_prefix() -> String {
    "FernError".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pending_timeout_ms: None,
            expose_cause: default_expose_cause(),
            failure_prefix: default_failure_prefix(),
        }
    }
}

impl ExecutorConfig {
    /// Creates an executor configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the configuration used for socket registries.
    #[must_use]
    pub fn socket() -> Self {
        Self::default().with_failure_prefix(SOCKET_FAILURE_PREFIX)
    }

    /// Bounds pending resolution.
    #[must_use]
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets whether failure payloads carry `stack`.
    #[must_use]
    pub fn with_expose_cause(mut self, expose: bool) -> Self {
        self.expose_cause = expose;
        self
    }

    /// Sets the failure prefix.
    #[must_use]
    pub fn with_failure_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failure_prefix = prefix.into();
        self
    }

    /// Gets the pending bound as a Duration.
    #[must_use]
    pub fn pending_timeout(&self) -> Option<Duration> {
        self.pending_timeout_ms.map(Duration::from_millis)
    }
}
