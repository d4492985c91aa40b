//! Adaptive per-resource throttling.
//!
//! A [`Throttler`] decides how long to wait before the next request to one
//! remote resource (the judge API, an LLM vendor, the scraping target). Delay
//! grows exponentially on [`Throttle::slowdown`] and recovers one step at a
//! time once `max_delay` has passed without another slowdown: remote services
//! punish bursts harshly but forgive gradually.
//!
//! The state sits behind a mutex that is never held across the sleep, so one
//! instance can be shared by concurrent workers through an `Arc`.

use crate::ThrottleConfig;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use steadfast_error::ConfigError;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Pacing contract consulted by the retry executor.
///
/// Call order for one sequence of attempts: `ready()` once, then for each
/// attempt `wait(i)`, the attempt itself, `touch()`, and `slowdown()` when the
/// failure indicates rate limiting.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Called once before a fresh sequence of attempts.
    fn ready(&self);

    /// Called before every attempt (1-based). Attempt 1 never sleeps.
    ///
    /// Always returns `true`.
    async fn wait(&self, attempt: u32) -> bool;

    /// Called after a failure that indicates the caller is being rate limited.
    fn slowdown(&self);

    /// Called after every completed attempt, success or failure.
    fn touch(&self);
}

/// Snapshot of a throttler's delay estimate.
///
/// Invariant: `min_delay <= current_delay <= max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleState {
    current_delay: Duration,
    min_delay: Duration,
    max_delay: Duration,
    growth_factor: f64,
    last_slowdown: Option<Instant>,
}

impl ThrottleState {
    /// Starts at `min_delay` with no slowdown recorded.
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            current_delay: config.min_delay(),
            min_delay: config.min_delay(),
            max_delay: config.max_delay(),
            growth_factor: config.growth_factor,
            last_slowdown: None,
        }
    }

    /// Delay slept before every attempt after the first.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Lower bound of the delay.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Upper bound of the delay, also the recovery window.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Multiplier applied on slowdown and divisor applied on recovery.
    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// When the last slowdown happened, if ever.
    pub fn last_slowdown(&self) -> Option<Instant> {
        self.last_slowdown
    }

    /// Grow the delay by the growth factor, clamped at `max_delay`.
    ///
    /// Products too large for a `Duration` saturate at `max_delay`.
    pub fn grow(&mut self, now: Instant) {
        let grown = self.current_delay.as_secs_f64() * self.growth_factor;
        self.current_delay = Duration::try_from_secs_f64(grown)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay));
        self.last_slowdown = Some(now);
    }

    /// One recovery step if more than `max_delay` passed since the last slowdown.
    ///
    /// Returns true when the delay was reduced.
    pub fn try_recover(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_slowdown else {
            return false;
        };
        if now.saturating_duration_since(last) <= self.max_delay {
            return false;
        }
        let recovered = self
            .current_delay
            .div_f64(self.growth_factor)
            .max(self.min_delay);
        let changed = recovered != self.current_delay;
        self.current_delay = recovered;
        changed
    }
}

/// Adaptive delay estimator for one remote resource.
///
/// # Example
///
/// ```rust,ignore
/// use steadfast_rate_limit::{Throttle, ThrottleConfig, Throttler};
///
/// let judge = Throttler::new("judge", ThrottleConfig::new(2_000, 60_000, 2.0))?;
/// judge.ready();
/// judge.wait(1).await; // never sleeps
/// judge.slowdown();    // 2s -> 4s
/// judge.wait(2).await; // sleeps 4s
/// ```
#[derive(Debug)]
pub struct Throttler {
    resource: String,
    state: Mutex<ThrottleState>,
}

impl Throttler {
    /// Create a throttler for the named resource.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration violates
    /// `0 < min_delay <= max_delay` or `growth_factor > 1`.
    pub fn new(resource: impl Into<String>, config: ThrottleConfig) -> Result<Self, ConfigError> {
        let resource = resource.into();
        config.validate().map_err(|e| {
            ConfigError::new(format!("Invalid throttle for {}: {}", resource, e.message))
        })?;
        debug!(
            resource = %resource,
            min_delay_ms = config.min_delay_ms,
            max_delay_ms = config.max_delay_ms,
            growth_factor = config.growth_factor,
            "Created throttler"
        );
        Ok(Self {
            state: Mutex::new(ThrottleState::new(&config)),
            resource,
        })
    }

    /// Name of the throttled resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Copy of the current state.
    pub fn state(&self) -> ThrottleState {
        *self.lock()
    }

    /// Delay the next non-first attempt would sleep.
    pub fn current_delay(&self) -> Duration {
        self.lock().current_delay
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        // State transitions cannot panic halfway, so a poisoned lock still holds valid state.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_recover(&self) {
        let mut state = self.lock();
        let before = state.current_delay;
        if state.try_recover(Instant::now()) {
            debug!(
                resource = %self.resource,
                from_ms = before.as_millis() as u64,
                to_ms = state.current_delay.as_millis() as u64,
                "Throttle recovered one step"
            );
        }
    }
}

#[async_trait]
impl Throttle for Throttler {
    fn ready(&self) {
        self.try_recover();
    }

    #[instrument(skip(self), fields(resource = %self.resource))]
    async fn wait(&self, attempt: u32) -> bool {
        if attempt <= 1 {
            return true;
        }
        let delay = self.current_delay();
        trace!(delay_ms = delay.as_millis() as u64, "Waiting before attempt");
        tokio::time::sleep(delay).await;
        true
    }

    fn slowdown(&self) {
        let mut state = self.lock();
        state.grow(Instant::now());
        debug!(
            resource = %self.resource,
            delay_ms = state.current_delay.as_millis() as u64,
            "Slowing down"
        );
    }

    fn touch(&self) {
        self.try_recover();
    }
}

/// Throttle that never sleeps.
///
/// Used where pacing is left entirely to a shared request-rate limiter, as in
/// bounded-parallel prompting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    fn ready(&self) {}

    async fn wait(&self, _attempt: u32) -> bool {
        true
    }

    fn slowdown(&self) {}

    fn touch(&self) {}
}
