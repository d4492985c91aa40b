//! Pacing for requests to unreliable remote services.
//!
//! This crate decides *when* a request may be sent and *how many* may be in
//! flight at once:
//!
//! - [`Throttler`] adapts the delay between attempts against one resource,
//!   growing it on rate-limit failures and recovering it gradually
//! - [`ConcurrencyLimiter`] bounds the number of work items running at once
//!   and optionally caps the aggregate request rate with a shared
//!   [`RequestRateLimiter`]
//! - [`SteadfastConfig`] loads the TOML configuration for all of the above
//!
//! ## Configuration
//!
//! Defaults ship in `steadfast.toml` and may be overridden by
//! `~/.config/steadfast/steadfast.toml` or `./steadfast.toml`:
//!
//! ```ignore
//! use steadfast_rate_limit::{SteadfastConfig, Throttler};
//!
//! let config = SteadfastConfig::load()?;
//! let judge = Throttler::new("judge", config.throttle("judge").unwrap_or_default())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limiter;
mod throttler;

pub use config::{BatchSettings, GuardSettings, RetrySettings, SteadfastConfig, ThrottleConfig};
pub use limiter::{Admission, ConcurrencyLimiter, RequestRateLimiter};
pub use throttler::{Throttle, ThrottleState, Throttler, Unthrottled};
