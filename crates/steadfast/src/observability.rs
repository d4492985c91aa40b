//! Logging setup for binaries built on steadfast.

use std::env;
use steadfast_error::{ConfigError, SteadfastResult};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How log lines are filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g., "info", "steadfast_retry=debug")
    pub log_level: String,
    /// Emit JSON lines instead of human-readable text
    pub json_logs: bool,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl LogConfig {
    /// Create a configuration with the given default filter.
    pub fn new(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            json_logs: false,
            with_target: false,
        }
    }

    /// Map a `-v` count to a level: none is `info`, one is `debug`, more is `trace`.
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self::new(level)
    }

    /// Enable JSON-formatted logs.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Show event targets.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// The filter to install: `RUST_LOG` when set and valid, otherwise `log_level`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `log_level` is not a valid filter directive.
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        if env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(&self.log_level).map_err(|e| {
            ConfigError::new(format!("invalid log filter '{}': {}", self.log_level, e))
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_verbosity(0)
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so that command output on stdout stays clean.
///
/// # Errors
///
/// Returns a `ConfigError` if the filter is invalid or a global subscriber
/// is already installed.
pub fn init_logging(config: LogConfig) -> SteadfastResult<()> {
    let env_filter = config.env_filter()?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::new(format!("failed to install log subscriber: {}", e)))?;

    tracing::debug!(level = %config.log_level, json = config.json_logs, "Logging initialized");
    Ok(())
}
