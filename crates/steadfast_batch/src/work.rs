//! The per-item contract between a batch driver and a command.

use crate::SubmitAndCheck;
use async_trait::async_trait;
use steadfast_error::{RetryError, SteadfastResult};
use steadfast_rate_limit::{RequestRateLimiter, RetrySettings, Throttle};
use steadfast_retry::RetryExecutor;
use tokio_util::sync::CancellationToken;

/// What an item's network interaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<T> {
    /// A result to persist
    Completed(T),
    /// Nothing to do for this item (already solved, no solution to submit, ...)
    Skipped(String),
}

/// Per-item view of the running batch.
#[derive(Debug, Clone)]
pub struct ItemContext {
    index: usize,
    total: usize,
    cancel: CancellationToken,
    rate: Option<RequestRateLimiter>,
}

impl ItemContext {
    pub(crate) fn new(
        index: usize,
        total: usize,
        cancel: CancellationToken,
        rate: Option<RequestRateLimiter>,
    ) -> Self {
        Self {
            index,
            total,
            cancel,
            rate,
        }
    }

    /// 1-based position of the item in the batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of items in the batch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Cancelled when the batch is shut down, e.g. by a termination signal.
    ///
    /// A breaker trip or fatal error elsewhere in the batch does not cancel it.
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Shorthand for `cancel().is_cancelled()`.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The batch's shared request-rate limiter, if configured.
    pub fn rate_limiter(&self) -> Option<&RequestRateLimiter> {
        self.rate.as_ref()
    }

    /// Retry executor wired to this batch's cancellation and rate limit.
    pub fn executor<'a, T: Throttle + ?Sized>(
        &self,
        throttle: &'a T,
        max_attempts: u32,
    ) -> RetryExecutor<'a, T> {
        let executor =
            RetryExecutor::new(throttle, max_attempts).with_cancellation(self.cancel.clone());
        match &self.rate {
            Some(rate) => executor.with_rate_limit(rate.clone()),
            None => executor,
        }
    }

    /// Submit-and-check flow wired to this batch's cancellation.
    pub fn submit_and_check<'a, T: Throttle + ?Sized>(
        &self,
        judge: &'a T,
        retry: &RetrySettings,
    ) -> SubmitAndCheck<'a, T> {
        SubmitAndCheck::new(judge, retry).with_cancellation(self.cancel.clone())
    }
}

/// One command's handling of a single work item.
///
/// `execute` performs the network interaction (normally through
/// [`ItemContext::executor`]); `save` persists its result and is always run
/// inside the cancellation guard's critical section when one is installed.
#[async_trait]
pub trait BatchWork: Send + Sync + 'static {
    /// Work item, e.g. a problem file path
    type Item: Send + Sync + 'static;
    /// Result to persist
    type Output: Send + 'static;

    /// Short label for log lines.
    fn describe(&self, item: &Self::Item) -> String;

    /// Run the item's remote interaction.
    async fn execute(
        &self,
        item: &Self::Item,
        ctx: &ItemContext,
    ) -> Result<ItemOutcome<Self::Output>, RetryError>;

    /// Persist a result, returning the number of bytes written.
    async fn save(&self, item: &Self::Item, output: Self::Output) -> SteadfastResult<u64>;
}
