//! Configuration structures for throttling, retries and batch execution.
//!
//! This module provides TOML-based configuration. The configuration system
//! supports:
//! - Bundled defaults (include_str! from steadfast.toml)
//! - User overrides (./steadfast.toml or ~/.config/steadfast/steadfast.toml)
//! - Automatic merging with user values taking precedence

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use steadfast_error::{ConfigError, SteadfastError, SteadfastResult};
use tracing::{debug, instrument};

/// Throttle parameters for one remote resource.
///
/// # Example
///
/// ```toml
/// [throttle.judge]
/// min_delay_ms = 2_000
/// max_delay_ms = 60_000
/// growth_factor = 2.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Smallest delay between attempts, in milliseconds
    pub min_delay_ms: u64,

    /// Largest delay between attempts and the recovery window, in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier applied on every slowdown (must be greater than 1)
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
}

fn default_growth_factor() -> f64 {
    2.0
}

impl Default for ThrottleConfig {
    /// One second floor, thirty second ceiling, doubling.
    fn default() -> Self {
        Self::new(1_000, 30_000, default_growth_factor())
    }
}

impl ThrottleConfig {
    /// Create a throttle configuration.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, growth_factor: f64) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms,
            growth_factor,
        }
    }

    /// Minimum delay as a `Duration`.
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Maximum delay as a `Duration`.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Validates `0 < min_delay <= max_delay` and a finite `growth_factor > 1`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay_ms == 0 {
            return Err(ConfigError::new("min_delay_ms must be positive"));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::new(format!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(ConfigError::new(format!(
                "growth_factor must be greater than 1, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// Attempt bounds per kind of remote interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Attempts per LLM prompt (including the first)
    #[serde(default = "default_prompt_attempts")]
    pub prompt_attempts: u32,

    /// Attempts per judge submission
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    /// Status checks per submission before giving up
    #[serde(default = "default_check_attempts")]
    pub check_attempts: u32,
}

fn default_prompt_attempts() -> u32 {
    3
}

fn default_submit_attempts() -> u32 {
    5
}

fn default_check_attempts() -> u32 {
    20
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            prompt_attempts: default_prompt_attempts(),
            submit_attempts: default_submit_attempts(),
            check_attempts: default_check_attempts(),
        }
    }
}

/// Admission and rate settings for one kind of batch.
///
/// # Example
///
/// ```toml
/// [batch.prompt]
/// concurrency = 4
/// rate_limit = 0.5   # requests per second across all workers
/// rate_burst = 1
/// breaker_threshold = 5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BatchSettings {
    /// Maximum number of items processed at once (0 = unbounded)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Aggregate requests per second across all workers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,

    /// Token bucket burst size (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_burst: Option<u32>,

    /// Upper bound of the random politeness delay before each admitted item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_delay_ms: Option<u64>,

    /// Consecutive item failures that abort the batch (0 = never)
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
}

fn default_concurrency() -> usize {
    1
}

fn default_breaker_threshold() -> u32 {
    5
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit: None,
            rate_burst: None,
            random_delay_ms: None,
            breaker_threshold: default_breaker_threshold(),
        }
    }
}

impl BatchSettings {
    /// Random politeness delay as a `Duration`.
    pub fn random_delay(&self) -> Option<Duration> {
        self.random_delay_ms.map(Duration::from_millis)
    }
}

/// Cancellation guard settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GuardSettings {
    /// How long a critical write may run before a repeated signal terminates anyway
    #[serde(default = "default_max_critical_wait_ms")]
    pub max_critical_wait_ms: u64,
}

fn default_max_critical_wait_ms() -> u64 {
    30_000
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            max_critical_wait_ms: default_max_critical_wait_ms(),
        }
    }
}

impl GuardSettings {
    /// Maximum critical section duration as a `Duration`.
    pub fn max_critical_wait(&self) -> Duration {
        Duration::from_millis(self.max_critical_wait_ms)
    }
}

/// Top-level steadfast configuration.
///
/// Loads configuration from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from steadfast.toml)
/// 2. User override (~/.config/steadfast/steadfast.toml, then ./steadfast.toml)
///
/// # Example
///
/// ```no_run
/// use steadfast_rate_limit::SteadfastConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SteadfastConfig::load()?;
/// let judge = config.throttle("judge").unwrap();
/// println!("Judge min delay: {:?}", judge.min_delay());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct SteadfastConfig {
    /// Map of resource name to throttle parameters
    #[serde(default)]
    pub throttle: HashMap<String, ThrottleConfig>,

    /// Attempt bounds
    #[serde(default)]
    pub retry: RetrySettings,

    /// Map of batch kind ("scrape", "prompt", "submit") to settings
    #[serde(default)]
    pub batch: HashMap<String, BatchSettings>,

    /// Cancellation guard settings
    #[serde(default)]
    pub guard: GuardSettings,
}

impl SteadfastConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> SteadfastResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                SteadfastError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                SteadfastError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (steadfast.toml shipped with the library)
    /// 2. User config in home directory (~/.config/steadfast/steadfast.toml)
    /// 3. User config in current directory (./steadfast.toml)
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> SteadfastResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder = Config::builder()
            .add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/steadfast/steadfast.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("steadfast").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                SteadfastError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                SteadfastError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Bundled default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../../steadfast.toml");

    /// Load only the bundled defaults, ignoring user files.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled file is invalid.
    pub fn defaults() -> SteadfastResult<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                SteadfastError::from(ConfigError::new(format!(
                    "Failed to parse bundled configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every throttle section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid section as a `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (resource, throttle) in &self.throttle {
            throttle.validate().map_err(|e| {
                ConfigError::new(format!("[throttle.{}]: {}", resource, e.message))
            })?;
        }
        for (kind, batch) in &self.batch {
            match batch.rate_limit {
                Some(rate) if !rate.is_finite() || rate <= 0.0 => {
                    return Err(ConfigError::new(format!(
                        "[batch.{}]: rate_limit must be positive, got {}",
                        kind, rate
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Throttle parameters for a resource.
    #[instrument(skip(self))]
    pub fn throttle(&self, resource: &str) -> Option<ThrottleConfig> {
        let found = self.throttle.get(resource).copied();
        debug!(found = found.is_some(), "Looking up throttle configuration");
        found
    }

    /// Batch settings for a batch kind, or the defaults if the section is absent.
    pub fn batch(&self, kind: &str) -> BatchSettings {
        self.batch.get(kind).copied().unwrap_or_default()
    }
}
