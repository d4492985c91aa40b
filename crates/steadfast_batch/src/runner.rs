//! Drives a batch of work items to completion or abort.

use crate::{BatchConfig, BatchCounters, BatchSummary, BatchWork, ItemContext, ItemOutcome};
use std::sync::{Arc, Mutex};
use steadfast_error::{ConfigError, ErrorClass};
use steadfast_guard::CancellationGuard;
use steadfast_rate_limit::ConcurrencyLimiter;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Why a batch stopped before running out of items.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum AbortReason {
    /// The consecutive-failure breaker tripped
    #[display("{} consecutive failures", _0)]
    TooManyFailures(u32),
    /// An item failed fatally
    #[display("fatal error: {}", _0)]
    Fatal(String),
    /// A termination signal arrived
    #[display("cancelled")]
    Cancelled,
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every item was handed to a worker
    Completed,
    /// Admission stopped early; in-flight items were drained
    Aborted(AbortReason),
}

/// Summary and outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Counter snapshot after every worker finished
    pub summary: BatchSummary,
    /// Whether the batch ran to the end
    pub outcome: BatchOutcome,
}

impl BatchReport {
    /// True if the batch stopped early.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Aborted(_))
    }
}

/// First abort reason wins; later ones are only logged.
#[derive(Debug, Default)]
struct AbortLatch(Mutex<Option<AbortReason>>);

impl AbortLatch {
    fn trip(&self, reason: AbortReason, halt: &CancellationToken) {
        {
            let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_none() {
                warn!(reason = %reason, "Stopping batch, draining in-flight items");
                *slot = Some(reason);
            }
        }
        halt.cancel();
    }

    fn take(&self) -> Option<AbortReason> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Everything a spawned item needs, shared across workers.
struct Shared<W: BatchWork> {
    work: Arc<W>,
    counters: BatchCounters,
    guard: Option<Arc<CancellationGuard>>,
    abort: AbortLatch,
    /// Stops admission only; in-flight items run to completion
    halt: CancellationToken,
    total: usize,
}

/// Runs work items with bounded parallelism, a failure breaker and protected saves.
///
/// # Example
///
/// ```rust,ignore
/// let config = BatchConfig::for_regime(Regime::BoundedPrompting, &steadfast_config);
/// let report = BatchRunner::new(config)?
///     .with_guard(guard.clone())
///     .run(problem_files, Arc::new(PromptWork::new(client)))
///     .await;
/// guard.honor_pending();
/// ```
#[derive(Debug)]
pub struct BatchRunner {
    config: BatchConfig,
    limiter: ConcurrencyLimiter,
    guard: Option<Arc<CancellationGuard>>,
    shutdown: CancellationToken,
}

impl BatchRunner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the rate limit is invalid.
    pub fn new(config: BatchConfig) -> Result<Self, ConfigError> {
        let limiter = config.limiter()?;
        Ok(Self {
            config,
            limiter,
            guard: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Save inside the guard's critical sections and stop on its signals.
    pub fn with_guard(mut self, guard: Arc<CancellationGuard>) -> Self {
        self.shutdown = guard.token().child_token();
        self.guard = Some(guard);
        self
    }

    /// Stop when `shutdown` is cancelled, without a signal guard.
    pub fn with_cancellation(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The configuration this runner was built from.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every item and return once all admitted items have finished.
    ///
    /// Admission stops when the breaker trips, an item fails fatally, or the
    /// shutdown token is cancelled. Only shutdown interrupts in-flight items;
    /// after a breaker trip or a fatal error they keep retrying and are
    /// counted. The summary is always logged.
    #[instrument(skip_all, fields(batch = %self.config.label(), total = items.len()))]
    pub async fn run<W: BatchWork>(&self, items: Vec<W::Item>, work: Arc<W>) -> BatchReport {
        let total = items.len();
        let shared = Arc::new(Shared {
            work,
            counters: BatchCounters::new(*self.config.breaker_threshold()),
            guard: self.guard.clone(),
            abort: AbortLatch::default(),
            halt: self.shutdown.child_token(),
            total,
        });
        let rate = self.limiter.rate_limiter().cloned();

        info!(
            concurrency = self.limiter.capacity(),
            rate_limit = ?self.config.rate_limit(),
            breaker_threshold = self.config.breaker_threshold(),
            "Processing {} item(s)...",
            total
        );

        let mut tasks = JoinSet::new();
        for (position, item) in items.into_iter().enumerate() {
            let Some(admission) = self.limiter.admit(&shared.halt).await else {
                debug!(remaining = total - position, "Admission stopped");
                break;
            };
            if shared.halt.is_cancelled() {
                debug!(remaining = total - position, "Admission stopped");
                break;
            }
            while let Some(joined) = tasks.try_join_next() {
                reap(&shared, joined);
            }

            let ctx = ItemContext::new(
                position + 1,
                total,
                self.shutdown.child_token(),
                rate.clone(),
            );
            let shared = shared.clone();
            tasks.spawn(
                async move {
                    let _admission = admission;
                    process_item(&shared, item, ctx).await;
                }
                .instrument(info_span!("item", index = position + 1)),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            reap(&shared, joined);
        }

        let outcome = match shared.abort.take() {
            Some(reason) => BatchOutcome::Aborted(reason),
            None if self.shutdown.is_cancelled() => BatchOutcome::Aborted(AbortReason::Cancelled),
            None => BatchOutcome::Completed,
        };
        let summary = shared.counters.summary(total);
        log_summary(&summary, &outcome);

        BatchReport { summary, outcome }
    }
}

/// Run items through a fresh [`BatchRunner`].
///
/// # Errors
///
/// Returns a `ConfigError` if the rate limit is invalid.
pub async fn run_batch<W: BatchWork>(
    items: Vec<W::Item>,
    work: Arc<W>,
    config: BatchConfig,
) -> Result<BatchReport, ConfigError> {
    Ok(BatchRunner::new(config)?.run(items, work).await)
}

async fn process_item<W: BatchWork>(shared: &Shared<W>, item: W::Item, ctx: ItemContext) {
    let label = shared.work.describe(&item);
    info!("[{}/{}] Processing {} ...", ctx.index(), shared.total, label);

    let output = match shared.work.execute(&item, &ctx).await {
        Ok(ItemOutcome::Completed(output)) => output,
        Ok(ItemOutcome::Skipped(reason)) => {
            info!(item = %label, "Skipped: {}", reason);
            shared.counters.record_skip();
            return;
        }
        Err(e) if e.is_cancelled() => {
            debug!(item = %label, "Cancelled");
            return;
        }
        Err(e) => {
            if let Some(ErrorClass::Fatal(reason)) = e.class() {
                error!(item = %label, error = %e, "Aborting...");
                shared.counters.record_fatal();
                shared
                    .abort
                    .trip(AbortReason::Fatal(reason.clone()), &shared.halt);
            } else {
                error!(item = %label, error = %e, "Failed to process item");
                record_failure(shared);
            }
            return;
        }
    };

    let saved = match &shared.guard {
        Some(guard) => guard.protect(shared.work.save(&item, output)).await,
        None => shared.work.save(&item, output).await,
    };
    match saved {
        Ok(bytes) => {
            debug!(item = %label, bytes, "Saved");
            shared.counters.record_success();
        }
        Err(e) => {
            error!(item = %label, error = %e, "Failed to save result");
            record_failure(shared);
        }
    }
}

fn record_failure<W: BatchWork>(shared: &Shared<W>) {
    if shared.counters.record_error() {
        let threshold = shared.counters.breaker().threshold();
        shared
            .abort
            .trip(AbortReason::TooManyFailures(threshold), &shared.halt);
    }
}

fn reap<W: BatchWork>(shared: &Shared<W>, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Worker panicked");
        record_failure(shared);
    }
}

fn log_summary(summary: &BatchSummary, outcome: &BatchOutcome) {
    if let BatchOutcome::Aborted(reason) = outcome {
        warn!(reason = %reason, "Batch aborted");
    }
    info!("Items processed: {}", summary.total());
    info!("Skipped: {}", summary.skipped());
    info!("Succeeded: {}", summary.succeeded());
    info!("Errors: {}", summary.errored());
}
