//! Batch drivers for remote work.
//!
//! A [`BatchRunner`] iterates work items, admits them through a
//! [`ConcurrencyLimiter`](steadfast_rate_limit::ConcurrencyLimiter), runs each
//! one's network interaction through a [`BatchWork`] implementation and
//! persists the result inside the cancellation guard's critical section.
//!
//! ## Stopping early
//!
//! - A fatal item failure stops admission at once
//! - [`ConsecutiveFailureBreaker`] stops admission after too many failures in a row
//! - A termination signal stops admission and cancels in-flight retries
//!
//! In every case in-flight items drain and the `succeeded/skipped/errored`
//! summary is logged and returned in a [`BatchReport`].
//!
//! ## Regimes
//!
//! [`Regime`] names the three batch shapes (bulk scraping, bounded prompting,
//! sequential submit-and-check) and [`BatchConfig::for_regime`] reads their
//! settings from configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod counters;
mod runner;
mod submit;
mod work;

pub use config::{BatchConfig, BatchConfigBuilder, BatchConfigBuilderError, Regime};
pub use counters::{BatchCounters, BatchSummary, ConsecutiveFailureBreaker};
pub use runner::{AbortReason, BatchOutcome, BatchReport, BatchRunner, run_batch};
pub use submit::SubmitAndCheck;
pub use work::{BatchWork, ItemContext, ItemOutcome};
