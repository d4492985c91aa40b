//! Bounded parallelism and aggregate request-rate limiting.
//!
//! This module provides two independent knobs:
//! - Tokio Semaphore bounding how many work items run at once
//! - Governor crate (GCRA algorithm) capping requests per second across all of them
//!
//! Pool size controls wall-clock overlap (hiding network latency across many
//! independent calls); the token bucket controls aggregate throughput
//! (respecting a vendor's quota no matter how many calls are in flight).

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use steadfast_error::ConfigError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_retry2::strategy::jitter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

// Type alias for our direct rate limiter
type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket shared by every worker of a batch.
///
/// Cloning is cheap and every clone draws from the same bucket.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RequestRateLimiter::new(0.5, 1)?; // one request every 2s
/// if limiter.until_ready(&cancel).await {
///     // send the request
/// }
/// ```
#[derive(Clone)]
pub struct RequestRateLimiter {
    bucket: Arc<DirectRateLimiter>,
    per_second: f64,
    burst: u32,
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("per_second", &self.per_second)
            .field("burst", &self.burst)
            .finish()
    }
}

impl RequestRateLimiter {
    /// Create a limiter allowing `per_second` requests with bursts of `burst`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the rate is not a positive finite number.
    pub fn new(per_second: f64, burst: u32) -> Result<Self, ConfigError> {
        if !per_second.is_finite() || per_second <= 0.0 {
            return Err(ConfigError::new(format!(
                "rate limit must be positive, got {}",
                per_second
            )));
        }
        let period = Duration::try_from_secs_f64(1.0 / per_second).map_err(|e| {
            ConfigError::new(format!("rate limit {} is too low: {}", per_second, e))
        })?;
        let burst_size = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| ConfigError::new(format!("rate limit {} is too high", per_second)))?
            .allow_burst(burst_size);

        debug!(per_second, burst = burst_size.get(), "Created request rate limiter");
        Ok(Self {
            bucket: Arc::new(GovernorRateLimiter::direct(quota)),
            per_second,
            burst: burst_size.get(),
        })
    }

    /// Configured requests per second.
    pub fn per_second(&self) -> f64 {
        self.per_second
    }

    /// Configured burst size.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Wait for a token.
    ///
    /// Returns `false` without consuming a token if `cancel` fires first.
    pub async fn until_ready(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let granted = cancel
            .run_until_cancelled(self.bucket.until_ready())
            .await
            .is_some();
        if !granted {
            trace!("Rate limiter wait cancelled");
        }
        granted
    }
}

/// Admission control for a batch of work items.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = ConcurrencyLimiter::new(2)
///     .with_random_delay(Duration::from_secs(15));
///
/// while let Some(admission) = limiter.admit(&cancel).await {
///     tokio::spawn(async move {
///         let _admission = admission; // slot released on drop
///         // process one item...
///     });
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
    rate: Option<RequestRateLimiter>,
    random_delay: Option<Duration>,
}

impl ConcurrencyLimiter {
    /// Admit at most `concurrency` items at once; 0 means unbounded.
    pub fn new(concurrency: usize) -> Self {
        let capacity = if concurrency == 0 {
            Semaphore::MAX_PERMITS
        } else {
            concurrency
        };
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            rate: None,
            random_delay: None,
        }
    }

    /// Cap the aggregate request rate with a shared token bucket.
    pub fn with_rate_limit(mut self, rate: RequestRateLimiter) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Sleep a random duration up to `max` after each admission.
    pub fn with_random_delay(mut self, max: Duration) -> Self {
        self.random_delay = Some(max);
        self
    }

    /// The shared request-rate limiter, if one is configured.
    pub fn rate_limiter(&self) -> Option<&RequestRateLimiter> {
        self.rate.as_ref()
    }

    /// Maximum number of concurrent admissions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Admissions currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available_slots()
    }

    /// Wait for a free slot, then for the random politeness delay if configured.
    ///
    /// Returns `None` if `cancel` fires before the item may start; the slot is
    /// released in that case.
    pub async fn admit(&self, cancel: &CancellationToken) -> Option<Admission> {
        if cancel.is_cancelled() {
            return None;
        }

        let permit = match cancel
            .run_until_cancelled(self.slots.clone().acquire_owned())
            .await
        {
            Some(Ok(permit)) => permit,
            Some(Err(e)) => {
                warn!(error = %e, "Admission pool closed");
                return None;
            }
            None => {
                trace!("Admission cancelled while waiting for a slot");
                return None;
            }
        };

        if let Some(max) = self.random_delay {
            let delay = jitter(max);
            trace!(delay_ms = delay.as_millis() as u64, "Politeness delay");
            cancel.run_until_cancelled(tokio::time::sleep(delay)).await?;
        }

        Some(Admission { _permit: permit })
    }
}

/// RAII guard for one admitted work item.
///
/// Releases the concurrency slot when dropped, even if the item fails or panics.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}
