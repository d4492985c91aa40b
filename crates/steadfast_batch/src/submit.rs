//! Submit a solution, then poll the judge until it reaches a verdict.

use std::future::Future;
use steadfast_error::{ErrorClass, RetryError};
use steadfast_rate_limit::{RetrySettings, Throttle};
use steadfast_retry::{PollStatus, RetryExecutor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Two retried phases against one judge throttle.
///
/// Both phases pace through the same throttle: a slowdown during submission
/// also spaces out the status checks, and vice versa.
///
/// # Example
///
/// ```rust,ignore
/// let verdict = ctx
///     .submit_and_check(&*self.judge, &self.retry)
///     .run(
///         || client.submit(&solution),
///         |id| client.check(*id),
///         ServiceClassifier::Judge.classifier(),
///     )
///     .await?;
/// ```
#[derive(Debug)]
pub struct SubmitAndCheck<'a, T: Throttle + ?Sized> {
    judge: &'a T,
    submit_attempts: u32,
    check_attempts: u32,
    cancel: CancellationToken,
}

impl<'a, T: Throttle + ?Sized> SubmitAndCheck<'a, T> {
    /// Create the flow with attempt bounds from `retry`.
    pub fn new(judge: &'a T, retry: &RetrySettings) -> Self {
        Self {
            judge,
            submit_attempts: retry.submit_attempts,
            check_attempts: retry.check_attempts,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `cancel` in both phases.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn executor(&self, max_attempts: u32) -> RetryExecutor<'a, T> {
        RetryExecutor::new(self.judge, max_attempts).with_cancellation(self.cancel.clone())
    }

    /// Submit with retries.
    ///
    /// A rejected submission also slows the judge throttle down.
    ///
    /// # Errors
    ///
    /// Returns the executor's `RetryError`.
    #[instrument(skip_all, fields(max_attempts = self.submit_attempts))]
    pub async fn submit<S, E, F, Fut, C>(&self, submit: F, classify: C) -> Result<S, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        let result = self.executor(self.submit_attempts).run(submit, classify).await;
        if let Err(e) = &result {
            if matches!(e.class(), Some(ErrorClass::NonRetriable(_))) {
                debug!("Submission rejected, slowing down");
                self.judge.slowdown();
            }
        }
        result
    }

    /// Poll the verdict until it is ready.
    ///
    /// # Errors
    ///
    /// Returns the executor's `RetryError`; running out of checks while the
    /// verdict is pending is a retriable failure.
    #[instrument(skip_all, fields(max_attempts = self.check_attempts))]
    pub async fn check<R, E, F, Fut, C>(&self, check: F, classify: C) -> Result<R, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<R>, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        self.executor(self.check_attempts).poll(check, classify).await
    }

    /// Submit, then check using the ticket the submission returned.
    ///
    /// # Errors
    ///
    /// Returns the first phase's error, if any, otherwise the second's.
    pub async fn run<S, R, E, FS, FutS, FC, FutC, C>(
        &self,
        submit: FS,
        mut check: FC,
        classify: C,
    ) -> Result<R, RetryError>
    where
        FS: FnMut() -> FutS,
        FutS: Future<Output = Result<S, E>>,
        FC: FnMut(&S) -> FutC,
        FutC: Future<Output = Result<PollStatus<R>, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        let ticket = self.submit(submit, &classify).await?;
        self.check(|| check(&ticket), &classify).await
    }
}
