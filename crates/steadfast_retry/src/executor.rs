//! Bounded retry loop driven by a throttle and a failure classifier.

use derive_getters::Getters;
use std::future::Future;
use steadfast_error::{ErrorClass, RetryError};
use steadfast_rate_limit::{RequestRateLimiter, Throttle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Result of one status check in a polling sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The remote operation finished
    Ready(T),
    /// Still in progress; check again
    Pending,
}

/// Bookkeeping for one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct AttemptRecord {
    attempt_index: u32,
    max_attempts: u32,
    last_error: Option<ErrorClass>,
}

impl AttemptRecord {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt_index: 0,
            max_attempts,
            last_error: None,
        }
    }

    fn is_last(&self) -> bool {
        self.attempt_index >= self.max_attempts
    }
}

/// Runs a unit of work up to `max_attempts` times.
///
/// Pacing is delegated entirely to the throttle: attempt 1 never sleeps,
/// every later attempt sleeps the throttle's current delay. A retriable
/// failure calls `slowdown()`; non-retriable and fatal failures return
/// immediately.
///
/// # Example
///
/// ```rust,ignore
/// use steadfast_retry::{RetryExecutor, ServiceClassifier};
///
/// let body = RetryExecutor::new(&judge, 5)
///     .with_cancellation(cancel.child_token())
///     .run(|| client.submit(&solution), |e| ServiceClassifier::Judge.classify(e))
///     .await?;
/// ```
#[derive(Debug)]
pub struct RetryExecutor<'a, T: Throttle + ?Sized> {
    throttle: &'a T,
    max_attempts: u32,
    cancel: CancellationToken,
    rate: Option<RequestRateLimiter>,
}

impl<'a, T: Throttle + ?Sized> RetryExecutor<'a, T> {
    /// Create an executor. A `max_attempts` of 0 is treated as 1.
    pub fn new(throttle: &'a T, max_attempts: u32) -> Self {
        Self {
            throttle,
            max_attempts: max_attempts.max(1),
            cancel: CancellationToken::new(),
            rate: None,
        }
    }

    /// Observe `cancel` between attempts and during every wait.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Take a token from a shared request-rate limiter before every attempt.
    pub fn with_rate_limit(mut self, rate: RequestRateLimiter) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Attempt bound, including the first attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt` until it succeeds, fails non-retriably, or runs out of attempts.
    ///
    /// # Errors
    ///
    /// Returns a `RetryError` carrying the last failure's class, or a
    /// cancellation if the token fired before an attempt could start.
    pub async fn run<R, E, F, Fut, C>(&self, mut attempt: F, classify: C) -> Result<R, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        self.drive(
            || {
                let fut = attempt();
                async move { fut.await.map(PollStatus::Ready) }
            },
            classify,
        )
        .await
    }

    /// Poll a remote status until it reports ready.
    ///
    /// A pending check consumes an attempt but does not slow the throttle
    /// down. Running out of attempts while still pending yields a retriable
    /// failure.
    ///
    /// # Errors
    ///
    /// Same as [`RetryExecutor::run`].
    pub async fn poll<R, E, F, Fut, C>(&self, attempt: F, classify: C) -> Result<R, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<R>, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        self.drive(attempt, classify).await
    }

    #[instrument(skip_all, fields(max_attempts = self.max_attempts))]
    async fn drive<R, E, F, Fut, C>(&self, mut attempt: F, classify: C) -> Result<R, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<R>, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        let mut record = AttemptRecord::new(self.max_attempts);
        self.throttle.ready();

        while !record.is_last() {
            let started = record.attempt_index;
            record.attempt_index += 1;

            if self.cancel.is_cancelled() {
                debug!(attempt = record.attempt_index, "Cancelled before attempt");
                return Err(RetryError::cancelled(started));
            }

            if self
                .cancel
                .run_until_cancelled(self.throttle.wait(record.attempt_index))
                .await
                .is_none()
            {
                debug!(attempt = record.attempt_index, "Cancelled during throttle wait");
                return Err(RetryError::cancelled(started));
            }

            if let Some(rate) = &self.rate {
                if !rate.until_ready(&self.cancel).await {
                    debug!(attempt = record.attempt_index, "Cancelled during rate limit wait");
                    return Err(RetryError::cancelled(started));
                }
            }

            let outcome = attempt().await;
            self.throttle.touch();

            match outcome {
                Ok(PollStatus::Ready(value)) => {
                    if record.attempt_index > 1 {
                        debug!(attempt = record.attempt_index, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(PollStatus::Pending) => {
                    debug!(attempt = record.attempt_index, "Still pending");
                    record.last_error = None;
                }
                Err(e) => match classify(&e) {
                    ErrorClass::Retriable(reason) => {
                        warn!(
                            attempt = record.attempt_index,
                            max_attempts = record.max_attempts,
                            reason = %reason,
                            "Attempt failed, will retry"
                        );
                        self.throttle.slowdown();
                        record.last_error = Some(ErrorClass::Retriable(reason));
                    }
                    class => {
                        debug!(attempt = record.attempt_index, class = %class, "Attempt failed permanently");
                        return Err(RetryError::failed(class, record.attempt_index));
                    }
                },
            }
        }

        let class = record.last_error.unwrap_or_else(|| {
            ErrorClass::Retriable(format!(
                "still pending after {} checks",
                record.max_attempts
            ))
        });
        warn!(max_attempts = record.max_attempts, class = %class, "Giving up");
        Err(RetryError::failed(class, record.max_attempts))
    }
}

/// Run `attempt` with a fresh executor and no cancellation.
///
/// # Errors
///
/// See [`RetryExecutor::run`].
pub async fn run_with_retry<R, E, F, Fut, C, T>(
    attempt: F,
    classify: C,
    throttle: &T,
    max_attempts: u32,
) -> Result<R, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    C: Fn(&E) -> ErrorClass,
    T: Throttle + ?Sized,
{
    RetryExecutor::new(throttle, max_attempts)
        .run(attempt, classify)
        .await
}
