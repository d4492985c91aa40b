//! Errors returned by the retry executor.

use crate::ErrorClass;

/// Why a retried unit of work gave up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RetryErrorKind {
    /// The last classified failure. `Retriable` here means attempts ran out.
    #[display("{}", _0)]
    Failed(ErrorClass),
    /// A cancellation request was observed between attempts
    #[display("cancelled")]
    Cancelled,
}

/// Retry executor error with location tracking.
///
/// # Examples
///
/// ```
/// use steadfast_error::{ErrorClass, RetryError, RetryErrorKind};
///
/// let err = RetryError::new(
///     RetryErrorKind::Failed(ErrorClass::Retriable("HTTP 429".to_string())),
///     3,
/// );
/// assert_eq!(err.attempts(), 3);
/// assert!(!err.aborts_batch());
/// assert!(format!("{}", err).contains("after 3 attempt(s)"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Retry Error: {} after {} attempt(s) at line {} in {}", kind, attempts, line, file)]
pub struct RetryError {
    kind: RetryErrorKind,
    attempts: u32,
    line: u32,
    file: &'static str,
}

impl RetryError {
    /// Create a new retry error with caller location tracking.
    #[track_caller]
    pub fn new(kind: RetryErrorKind, attempts: u32) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            attempts,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a classified failure.
    #[track_caller]
    pub fn failed(class: ErrorClass, attempts: u32) -> Self {
        Self::new(RetryErrorKind::Failed(class), attempts)
    }

    /// Shorthand for a cancellation.
    #[track_caller]
    pub fn cancelled(attempts: u32) -> Self {
        Self::new(RetryErrorKind::Cancelled, attempts)
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RetryErrorKind {
        &self.kind
    }

    /// Number of attempts actually started.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The classification of the last failure, if the run was not cancelled.
    pub fn class(&self) -> Option<&ErrorClass> {
        match &self.kind {
            RetryErrorKind::Failed(class) => Some(class),
            RetryErrorKind::Cancelled => None,
        }
    }

    /// True when the run stopped because of a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, RetryErrorKind::Cancelled)
    }

    /// True when the caller must stop the whole batch (fatal or cancelled).
    pub fn aborts_batch(&self) -> bool {
        match &self.kind {
            RetryErrorKind::Failed(class) => class.aborts_batch(),
            RetryErrorKind::Cancelled => true,
        }
    }
}

impl From<ErrorClass> for RetryError {
    #[track_caller]
    fn from(class: ErrorClass) -> Self {
        Self::failed(class, 0)
    }
}
