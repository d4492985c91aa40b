//! Batch regimes and their configuration.

use std::time::Duration;
use steadfast_error::ConfigError;
use steadfast_rate_limit::{BatchSettings, ConcurrencyLimiter, RequestRateLimiter, SteadfastConfig};

/// The three ways batches talk to remote services.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
pub enum Regime {
    /// Many independent downloads, small parallelism, randomised politeness delay
    #[strum(serialize = "scrape")]
    BulkScrape,
    /// Worker pool of LLM calls sharing one request-rate limiter
    #[strum(serialize = "prompt")]
    BoundedPrompting,
    /// One item at a time, submit then poll the judge
    #[strum(serialize = "submit")]
    SequentialSubmit,
}

impl Regime {
    /// Throttle section used by this regime.
    pub fn throttle_resource(&self) -> &'static str {
        match self {
            Regime::BulkScrape => "scraper",
            Regime::BoundedPrompting => "llm",
            Regime::SequentialSubmit => "judge",
        }
    }
}

/// Admission, rate and breaker settings for one batch run.
///
/// # Example
///
/// ```
/// use steadfast_batch::BatchConfigBuilder;
///
/// let config = BatchConfigBuilder::default()
///     .label("prompt")
///     .concurrency(4_usize)
///     .rate_limit(0.5)
///     .build()
///     .unwrap();
/// assert_eq!(*config.breaker_threshold(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into))]
pub struct BatchConfig {
    /// Name used in log lines
    #[builder(default = "\"batch\".to_string()")]
    label: String,
    /// Items processed at once (0 = unbounded)
    #[builder(default = "1")]
    concurrency: usize,
    /// Aggregate requests per second across all workers
    #[builder(default)]
    rate_limit: Option<f64>,
    /// Token bucket burst size
    #[builder(default = "1")]
    rate_burst: u32,
    /// Upper bound of the random delay before each admitted item
    #[builder(default)]
    random_delay: Option<Duration>,
    /// Consecutive failures that abort the batch (0 = never)
    #[builder(default = "5")]
    breaker_threshold: u32,
}

impl BatchConfig {
    /// Configuration for a regime from the `[batch.<regime>]` section.
    ///
    /// Sequential submission always runs one item at a time.
    pub fn for_regime(regime: Regime, config: &SteadfastConfig) -> Self {
        let mut batch = Self::from_settings(regime.to_string(), &config.batch(&regime.to_string()));
        if regime == Regime::SequentialSubmit {
            batch.concurrency = 1;
        }
        batch
    }

    /// Configuration from one settings section.
    pub fn from_settings(label: impl Into<String>, settings: &BatchSettings) -> Self {
        Self {
            label: label.into(),
            concurrency: settings.concurrency,
            rate_limit: settings.rate_limit,
            rate_burst: settings.rate_burst.unwrap_or(1),
            random_delay: settings.random_delay(),
            breaker_threshold: settings.breaker_threshold,
        }
    }

    /// Build the admission limiter described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the rate limit is not positive.
    pub fn limiter(&self) -> Result<ConcurrencyLimiter, ConfigError> {
        let mut limiter = ConcurrencyLimiter::new(self.concurrency);
        if let Some(rate) = self.rate_limit {
            limiter = limiter.with_rate_limit(RequestRateLimiter::new(rate, self.rate_burst)?);
        }
        if let Some(delay) = self.random_delay {
            limiter = limiter.with_random_delay(delay);
        }
        Ok(limiter)
    }
}
