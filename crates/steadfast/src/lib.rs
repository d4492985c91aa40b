//! Steadfast - resilient request execution for batch pipelines
//!
//! Steadfast keeps long-running batches of remote calls (scraping problem
//! pages, prompting LLM vendors, submitting to an online judge) moving through
//! rate limits, transient failures and operator interrupts without losing work.
//!
//! # Features
//!
//! - **Adaptive throttling**: per-resource delays that double on trouble and
//!   recover after a quiet window
//! - **Retry execution**: bounded attempts with error classification into
//!   retriable, non-retriable and fatal failures
//! - **Admission control**: concurrency slots, a shared request-rate limiter
//!   and randomised politeness delays
//! - **Safe shutdown**: the first signal stops new work, a second one never
//!   interrupts a result being written
//! - **Batch drivers**: worker pools with a consecutive-failure breaker and a
//!   summary of what happened
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use steadfast::{
//!     BatchConfig, BatchRunner, CancellationGuard, LogConfig, Regime, SteadfastConfig,
//!     init_logging,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(LogConfig::from_verbosity(1))?;
//!     let config = SteadfastConfig::load()?;
//!     let guard = CancellationGuard::install(config.guard.clone())?;
//!
//!     let report = BatchRunner::new(BatchConfig::for_regime(Regime::BoundedPrompting, &config))?
//!         .with_guard(guard.clone())
//!         .run(problems, Arc::new(PromptWork::new(&config)?))
//!         .await;
//!
//!     guard.honor_pending();
//!     println!("{} succeeded", report.summary.succeeded());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Steadfast is organized as a workspace with focused crates:
//!
//! - `steadfast_error` - Error types and the error classification
//! - `steadfast_rate_limit` - Configuration, throttlers and admission limiters
//! - `steadfast_retry` - Retry executor and HTTP failure classification
//! - `steadfast_guard` - Signal-driven cancellation with critical sections
//! - `steadfast_storage` - Atomic JSON result files
//! - `steadfast_batch` - Batch runner, breaker and submit-then-check flow
//!
//! This crate (`steadfast`) re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod observability;

pub use observability::{LogConfig, init_logging};

// Re-export error types
pub use steadfast_error::{
    ConfigError, ErrorClass, GuardError, GuardErrorKind, RetryError, RetryErrorKind,
    SteadfastError, SteadfastErrorKind, SteadfastResult, StorageError, StorageErrorKind,
};

// Re-export pacing
pub use steadfast_rate_limit::{
    Admission, BatchSettings, ConcurrencyLimiter, GuardSettings, RequestRateLimiter,
    RetrySettings, SteadfastConfig, Throttle, ThrottleConfig, ThrottleState, Throttler,
    Unthrottled,
};

// Re-export retry execution
pub use steadfast_retry::{
    AttemptRecord, HttpFailure, PollStatus, RetryExecutor, ServiceClassifier, run_with_retry,
};

// Re-export cancellation
pub use steadfast_guard::{
    CancellationGuard, CriticalSection, ProcessTerminator, TermSignal, Terminate,
};

// Re-export storage
pub use steadfast_storage::JsonRecordStore;

// Re-export batch drivers
pub use steadfast_batch::{
    AbortReason, BatchConfig, BatchConfigBuilder, BatchConfigBuilderError, BatchCounters, BatchOutcome, BatchReport,
    BatchRunner, BatchSummary, BatchWork, ConsecutiveFailureBreaker, ItemContext, ItemOutcome,
    Regime, SubmitAndCheck, run_batch,
};
